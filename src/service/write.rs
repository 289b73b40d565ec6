//! Write paths: mark, delete, move, send, reply and forward.
//!
//! Batch mutations never stop at the first failing id. Dry runs echo
//! the request back without touching the backend. Writes go to the
//! server only; the cache catches up on the next sync.

use super::compose;
use super::{
    DeleteRequest, DeleteResponse, ForwardRequest, ItemOutcome, MailService, MarkRequest,
    MarkResponse, MoveRequest, MoveResponse, ReplyRequest, SendRequest, SendResponse,
};
use crate::account::Account;
use crate::backend::{MailBackend, OutgoingMessage};
use crate::error::{Error, Result};
use crate::flag::{Flag, FlagAction};
use tracing::{info, warn};

fn require_ids(ids: &[u32]) -> Result<()> {
    if ids.is_empty() {
        return Err(Error::InvalidArgument("at least one message id is required".into()));
    }
    Ok(())
}

fn succeeded(results: &[ItemOutcome]) -> usize {
    results.iter().filter(|r| r.success).count()
}

fn batch_error(results: &[ItemOutcome]) -> Option<String> {
    let failed = results.len() - succeeded(results);
    (failed > 0).then(|| {
        Error::PartialFailure {
            failed,
            total: results.len(),
        }
        .to_string()
    })
}

impl<B: MailBackend> MailService<B> {
    /// Apply a mark operation to each id independently.
    pub async fn mark_emails(&self, request: &MarkRequest) -> MarkResponse {
        if request.dry_run {
            return MarkResponse {
                success: true,
                dry_run: true,
                would_mark: Some(request.ids.len()),
                mark_as: Some(request.mark_as),
                ids: request.ids.clone(),
                ..MarkResponse::default()
            };
        }
        match self.try_mark(request).await {
            Ok(response) => response,
            Err(e) => MarkResponse::failed(&e),
        }
    }

    async fn try_mark(&self, request: &MarkRequest) -> Result<MarkResponse> {
        require_ids(&request.ids)?;
        let account = self.account(request.account.as_deref())?;
        let (flag, action) = request.mark_as.flag_change();

        let mut results = Vec::with_capacity(request.ids.len());
        for &uid in &request.ids {
            let result = self
                .backend
                .mutate_flags(account, &request.folder, uid, flag, action)
                .await;
            results.push(ItemOutcome::from_result(uid, &result));
        }

        let marked = succeeded(&results);
        info!(
            account = %account.email,
            mark_as = %request.mark_as,
            "Marked {}/{} message(s)",
            marked,
            results.len()
        );
        Ok(MarkResponse {
            success: marked == results.len(),
            error: batch_error(&results),
            dry_run: false,
            would_mark: None,
            mark_as: Some(request.mark_as),
            ids: request.ids.clone(),
            marked,
            results,
        })
    }

    /// Delete each id: into the trash folder, or permanently.
    pub async fn delete_emails(&self, request: &DeleteRequest) -> DeleteResponse {
        if request.dry_run {
            return DeleteResponse {
                success: true,
                dry_run: true,
                would_delete: Some(request.ids.len()),
                permanent: request.permanent,
                ids: request.ids.clone(),
                ..DeleteResponse::default()
            };
        }
        match self.try_delete(request).await {
            Ok(response) => response,
            Err(e) => DeleteResponse::failed(&e),
        }
    }

    async fn try_delete(&self, request: &DeleteRequest) -> Result<DeleteResponse> {
        require_ids(&request.ids)?;
        let account = self.account(request.account.as_deref())?;
        let trash = if request.permanent {
            None
        } else {
            Some(
                self.backend
                    .resolve_trash(account, &self.settings.trash_folder)
                    .await?,
            )
        };
        if let Some(trash) = &trash
            && request.folder.eq_ignore_ascii_case(trash)
        {
            return Err(Error::InvalidArgument(format!(
                "{} is already the trash folder; pass permanent to delete from it",
                request.folder
            )));
        }
        let trash_name = trash.as_deref().unwrap_or(&self.settings.trash_folder);

        let mut results = Vec::with_capacity(request.ids.len());
        for &uid in &request.ids {
            let result = self
                .backend
                .move_or_delete(account, &request.folder, uid, request.permanent, trash_name)
                .await;
            results.push(ItemOutcome::from_result(uid, &result));
        }

        let deleted = succeeded(&results);
        info!(
            account = %account.email,
            permanent = request.permanent,
            "Deleted {}/{} message(s)",
            deleted,
            results.len()
        );
        Ok(DeleteResponse {
            success: deleted == results.len(),
            error: batch_error(&results),
            dry_run: false,
            would_delete: None,
            permanent: request.permanent,
            ids: request.ids.clone(),
            trash_folder: trash,
            deleted,
            results,
        })
    }

    /// Move each id to `destination`.
    pub async fn move_emails(&self, request: &MoveRequest) -> MoveResponse {
        if request.dry_run {
            return MoveResponse {
                success: true,
                dry_run: true,
                would_move: Some(request.ids.len()),
                destination: request.destination.clone(),
                ids: request.ids.clone(),
                ..MoveResponse::default()
            };
        }
        match self.try_move(request).await {
            Ok(response) => response,
            Err(e) => MoveResponse::failed(&e),
        }
    }

    async fn try_move(&self, request: &MoveRequest) -> Result<MoveResponse> {
        require_ids(&request.ids)?;
        let destination = request.destination.trim();
        if destination.is_empty() {
            return Err(Error::InvalidArgument("destination folder is required".into()));
        }
        if destination == request.folder {
            return Err(Error::InvalidArgument(
                "destination is the same as the source folder".into(),
            ));
        }
        let account = self.account(request.account.as_deref())?;

        let mut results = Vec::with_capacity(request.ids.len());
        for &uid in &request.ids {
            let result = self
                .backend
                .move_message(account, &request.folder, uid, destination)
                .await;
            results.push(ItemOutcome::from_result(uid, &result));
        }

        let moved = succeeded(&results);
        Ok(MoveResponse {
            success: moved == results.len(),
            error: batch_error(&results),
            dry_run: false,
            would_move: None,
            destination: destination.to_string(),
            ids: request.ids.clone(),
            moved,
            results,
        })
    }

    async fn submit(&self, account: &Account, message: &OutgoingMessage) -> SendResponse {
        match self.backend.send(account, message).await {
            Ok(receipt) => SendResponse {
                success: true,
                error: None,
                account_id: account.id.clone(),
                message_id: Some(receipt.message_id),
                to: message.to.clone(),
                subject: message.subject.clone(),
            },
            Err(e) => SendResponse {
                account_id: account.id.clone(),
                to: message.to.clone(),
                subject: message.subject.clone(),
                ..SendResponse::failed(&e)
            },
        }
    }

    /// Compose and submit a new message.
    pub async fn send_email(&self, request: &SendRequest) -> SendResponse {
        let account = match self.account(request.account.as_deref()) {
            Ok(account) => account,
            Err(e) => return SendResponse::failed(&e),
        };
        if request.text.is_none() && request.html.is_none() {
            return SendResponse::failed(&Error::InvalidArgument(
                "a text or html body is required".into(),
            ));
        }
        let message = OutgoingMessage {
            to: request.to.clone(),
            cc: request.cc.clone(),
            bcc: request.bcc.clone(),
            subject: request.subject.clone(),
            text: request.text.clone(),
            html: request.html.clone(),
            attachments: request.attachments.clone(),
            headers: request.headers.clone(),
            ..OutgoingMessage::default()
        };
        self.submit(account, &message).await
    }

    /// Reply to a message, threading it under the original. The source
    /// is flagged `\Answered` once the reply is accepted.
    pub async fn reply_email(&self, request: &ReplyRequest) -> SendResponse {
        let prepared = async {
            let account = self.account(request.account.as_deref())?;
            let source = self
                .backend
                .fetch_one(account, &request.folder, request.uid)
                .await?;
            let message = compose::reply(
                &account.email,
                &source,
                &request.text,
                request.html.clone(),
                request.reply_all,
            );
            Ok::<_, Error>((account, message))
        }
        .await;
        let (account, message) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return SendResponse::failed(&e),
        };

        let response = self.submit(account, &message).await;
        if response.success
            && let Err(e) = self
                .backend
                .mutate_flags(account, &request.folder, request.uid, Flag::Answered, FlagAction::Add)
                .await
        {
            warn!(uid = request.uid, "Failed to flag source as answered: {}", e);
        }
        response
    }

    /// Forward a message with its attachments.
    pub async fn forward_email(&self, request: &ForwardRequest) -> SendResponse {
        let prepared = async {
            let account = self.account(request.account.as_deref())?;
            let source = self
                .backend
                .fetch_one(account, &request.folder, request.uid)
                .await?;
            let message =
                compose::forward(&source, request.to.clone(), request.cc.clone(), request.text.as_deref());
            Ok::<_, Error>((account, message))
        }
        .await;
        match prepared {
            Ok((account, message)) => self.submit(account, &message).await,
            Err(e) => SendResponse::failed(&e),
        }
    }
}
