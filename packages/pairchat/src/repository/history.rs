use anyhow::{Context, Result};
use sqlx::Row;

use crate::models::StoredMessage;

use super::MessageRepository;

impl MessageRepository {
    /// Durably persist one message, returning its rowid.
    pub async fn append_message(&self, msg: &StoredMessage) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (from_user, to_user, body, sent_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&msg.from_user)
        .bind(&msg.to_user)
        .bind(&msg.body)
        .bind(&msg.time)
        .execute(&self.pool)
        .await
        .context("Failed to insert chat message")?;

        Ok(result.last_insert_rowid())
    }

    /// Get the full history for an unordered participant pair, oldest first.
    /// Matches `{from,to}` in either orientation; each call re-executes the
    /// query, no cursor state is retained.
    pub async fn history_for_pair(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_user, to_user, body, sent_at
            FROM messages
            WHERE (from_user = ? AND to_user = ?)
               OR (from_user = ? AND to_user = ?)
            ORDER BY id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query chat history")?;

        Ok(rows
            .into_iter()
            .map(|r| StoredMessage {
                id: r.get("id"),
                from_user: r.get("from_user"),
                to_user: r.get("to_user"),
                body: r.get("body"),
                time: r.get("sent_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::format_message;
    use crate::repository::test_helpers;

    #[tokio::test]
    async fn append_and_query_pair() {
        let repo = test_helpers::test_repository().await;

        let msg = format_message("Alice", "Bob", "hello world");
        let id = repo.append_message(&msg).await.unwrap();
        assert!(id > 0);

        let history = repo.history_for_pair("Alice", "Bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, Some(id));
        assert_eq!(history[0].body, "hello world");
        // Stored time is the format-time stamp, verbatim
        assert_eq!(history[0].time, msg.time);
    }

    #[tokio::test]
    async fn pair_query_is_symmetric() {
        let repo = test_helpers::test_repository().await;

        repo.append_message(&format_message("Alice", "Bob", "a to b"))
            .await
            .unwrap();
        repo.append_message(&format_message("Bob", "Alice", "b to a"))
            .await
            .unwrap();

        let forward = repo.history_for_pair("Alice", "Bob").await.unwrap();
        let reverse = repo.history_for_pair("Bob", "Alice").await.unwrap();
        assert_eq!(forward.len(), 2);
        assert_eq!(forward, reverse);
    }

    #[tokio::test]
    async fn history_is_insertion_ordered() {
        let repo = test_helpers::test_repository().await;

        repo.append_message(&format_message("Alice", "Bob", "first"))
            .await
            .unwrap();
        repo.append_message(&format_message("Bob", "Alice", "second"))
            .await
            .unwrap();
        repo.append_message(&format_message("Alice", "Bob", "third"))
            .await
            .unwrap();

        let history = repo.history_for_pair("Alice", "Bob").await.unwrap();
        let bodies: Vec<&str> = history.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn pairs_are_isolated() {
        let repo = test_helpers::test_repository().await;

        repo.append_message(&format_message("Alice", "Bob", "for bob"))
            .await
            .unwrap();
        repo.append_message(&format_message("Alice", "Carol", "for carol"))
            .await
            .unwrap();

        let ab = repo.history_for_pair("Alice", "Bob").await.unwrap();
        assert_eq!(ab.len(), 1);
        assert_eq!(ab[0].body, "for bob");

        let ac = repo.history_for_pair("Alice", "Carol").await.unwrap();
        assert_eq!(ac.len(), 1);
        assert_eq!(ac[0].body, "for carol");

        let bc = repo.history_for_pair("Bob", "Carol").await.unwrap();
        assert!(bc.is_empty());
    }

    #[tokio::test]
    async fn appended_message_appears_exactly_once() {
        let repo = test_helpers::test_repository().await;

        let msg = format_message("Alice", "Bob", "only once");
        let id = repo.append_message(&msg).await.unwrap();

        let history = repo.history_for_pair("Bob", "Alice").await.unwrap();
        let hits: Vec<_> = history.iter().filter(|m| m.id == Some(id)).collect();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn empty_body_is_stored() {
        let repo = test_helpers::test_repository().await;

        repo.append_message(&format_message("Alice", "Bob", ""))
            .await
            .unwrap();

        let history = repo.history_for_pair("Alice", "Bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "");
    }
}
