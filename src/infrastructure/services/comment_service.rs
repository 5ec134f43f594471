use std::sync::Arc;

use crate::domain::comment::Comment;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::prompt::{Prompt, PromptId};
use crate::domain::storage::Storage;
use crate::domain::user::UserId;

/// Discussion threads on prompts. Anyone who can read a prompt may
/// comment on it; only the author may edit or delete a comment.
///
/// Visibility of the prompt itself is resolved by callers through
/// [`PromptService`](super::PromptService) before reaching here.
#[derive(Debug)]
pub struct CommentService {
    comments: Arc<dyn Storage<Comment>>,
    prompts: Arc<dyn Storage<Prompt>>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn Storage<Comment>>, prompts: Arc<dyn Storage<Prompt>>) -> Self {
        Self { comments, prompts }
    }

    pub async fn create(
        &self,
        author: &UserId,
        prompt_id: &PromptId,
        body: impl Into<String>,
    ) -> DomainResult<Comment> {
        if !self.prompts.exists(prompt_id).await? {
            return Err(DomainError::not_found(format!("prompt '{prompt_id}'")));
        }
        let comment = Comment::new(prompt_id.clone(), author.clone(), body)?;
        self.comments.put(&comment).await?;
        Ok(comment)
    }

    /// Comments on a prompt, oldest first.
    pub async fn list(&self, prompt_id: &PromptId) -> DomainResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .list()
            .await?
            .into_iter()
            .filter(|comment| comment.prompt_id() == prompt_id)
            .collect();
        comments.sort_by_key(|comment| comment.created_at());
        Ok(comments)
    }

    pub async fn edit(
        &self,
        author: &UserId,
        comment_id: &str,
        body: impl Into<String>,
    ) -> DomainResult<Comment> {
        let mut comment = self.authored(author, comment_id).await?;
        comment.set_body(body)?;
        self.comments.put(&comment).await?;
        Ok(comment)
    }

    pub async fn delete(&self, author: &UserId, comment_id: &str) -> DomainResult<()> {
        self.authored(author, comment_id).await?;
        self.comments.delete(&comment_id.to_string()).await?;
        Ok(())
    }

    async fn authored(&self, author: &UserId, comment_id: &str) -> DomainResult<Comment> {
        let comment = self
            .comments
            .get(&comment_id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("comment '{comment_id}'")))?;
        if comment.author() != author {
            return Err(DomainError::forbidden(format!(
                "comment '{comment_id}' belongs to another user"
            )));
        }
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    fn service() -> (CommentService, Arc<InMemoryStorage<Prompt>>) {
        let comments = Arc::new(InMemoryStorage::new());
        let prompts = Arc::new(InMemoryStorage::new());
        (CommentService::new(comments, prompts.clone()), prompts)
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn pid() -> PromptId {
        PromptId::new("greet").unwrap()
    }

    async fn seed(prompts: &InMemoryStorage<Prompt>) {
        let prompt = Prompt::new(pid(), "Greeting", "Hello!", alice()).unwrap();
        prompts.put(&prompt).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_requires_existing_prompt() {
        let (service, _) = service();
        assert!(matches!(
            service.create(&alice(), &pid(), "hello").await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_list_ordered() {
        let (service, prompts) = service();
        seed(&prompts).await;
        service.create(&alice(), &pid(), "first").await.unwrap();
        service.create(&alice(), &pid(), "second").await.unwrap();

        let listed = service.list(&pid()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].body(), "first");
        assert_eq!(listed[1].body(), "second");
    }

    #[tokio::test]
    async fn test_only_author_edits_and_deletes() {
        let (service, prompts) = service();
        seed(&prompts).await;
        let comment = service.create(&alice(), &pid(), "draft").await.unwrap();
        let bob = UserId::new("bob").unwrap();

        assert!(matches!(
            service.edit(&bob, comment.id(), "hijacked").await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete(&bob, comment.id()).await,
            Err(DomainError::Forbidden(_))
        ));

        let edited = service.edit(&alice(), comment.id(), "final").await.unwrap();
        assert_eq!(edited.body(), "final");
        service.delete(&alice(), comment.id()).await.unwrap();
        assert!(service.list(&pid()).await.unwrap().is_empty());
    }
}
