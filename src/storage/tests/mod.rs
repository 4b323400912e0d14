// src/storage/tests/mod.rs


// Behaviour every LinkStore implementation must share
pub(crate) mod common {
    use crate::error::{Result, ShortenerError};
    use crate::storage::LinkStore;

    // Test basic create / lookup / delete on any store
    pub async fn test_basic_operations<S: LinkStore>(store: &S) -> Result<()> {
        let record = store.create("basic", "https://example.com/basic", 0).await?;
        assert_eq!(record.code, "basic");
        assert_eq!(record.clicks, 0);
        assert_eq!(record.expires_at, None);

        let found = store.lookup("basic").await?;
        assert_eq!(found.as_ref().map(|r| r.long_url.as_str()), Some("https://example.com/basic"));
        assert!(store.exists("basic").await?);

        // Test exists on non-existing code
        assert!(!store.exists("missing").await?);
        assert_eq!(store.lookup("missing").await?, None);

        // Test delete
        assert!(store.delete("basic").await?);
        assert!(!store.delete("basic").await?);
        assert!(!store.exists("basic").await?);

        Ok(())
    }

    // A live code cannot be created twice, however it was read in between
    pub async fn test_code_uniqueness<S: LinkStore>(store: &S) -> Result<()> {
        store.create("taken", "https://example.com/1", 0).await?;
        store.lookup("taken").await?;
        store.record_hit("taken").await?;
        store.list().await?;

        let second = store.create("taken", "https://example.com/2", 0).await;
        assert_eq!(second, Err(ShortenerError::CodeTaken("taken".to_string())));

        // the original mapping is untouched
        let record = store.lookup("taken").await?.expect("record should still exist");
        assert_eq!(record.long_url, "https://example.com/1");

        // a deleted alias is immediately available again
        store.delete("taken").await?;
        store.create("taken", "https://example.com/3", 0).await?;

        Ok(())
    }

    // Click counting and the summary's top record
    pub async fn test_click_accounting<S: LinkStore>(store: &S) -> Result<()> {
        store.create("one", "https://example.com/1", 0).await?;
        store.create("two", "https://example.com/2", 0).await?;

        for _ in 0..5 {
            assert_eq!(store.record_hit("two").await?.as_deref(), Some("https://example.com/2"));
        }
        assert_eq!(store.record_hit("nobody").await?, None);

        let record = store.lookup("two").await?.expect("record should exist");
        assert_eq!(record.clicks, 5);

        let summary = store.summary().await?;
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.total_clicks, 5);
        assert_eq!(summary.active_count, 2);
        assert_eq!(summary.top_code.as_deref(), Some("two"));
        assert_eq!(summary.top_clicks, 5);

        Ok(())
    }
}
