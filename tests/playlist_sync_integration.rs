//! End-to-end synchronisation against SQLite, in memory and on disk

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use m3u_sync::config::DatabaseConfig;
use m3u_sync::database::Database;
use m3u_sync::errors::{AppError, RepositoryError, RepositoryResult, SourceResult};
use m3u_sync::models::{
    Channel, ChannelCreateRequest, ChannelMetadata, ChannelUpdateRequest, Playlist,
    PlaylistCreateRequest,
};
use m3u_sync::repositories::{
    InMemoryPlaylistRepository, PlaylistRepository, SqlitePlaylistRepository,
};
use m3u_sync::services::{PlaylistService, PlaylistSyncService};
use m3u_sync::sources::PlaylistFetcher;

/// Serves whatever text was most recently queued for a URL
#[derive(Default)]
struct ScriptedFetcher {
    responses: Mutex<HashMap<String, String>>,
}

impl ScriptedFetcher {
    fn set(&self, url: &str, content: &str) {
        self.responses
            .lock()
            .expect("fetcher lock poisoned")
            .insert(url.to_string(), content.to_string());
    }
}

#[async_trait]
impl PlaylistFetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> SourceResult<String> {
        let responses = self.responses.lock().expect("fetcher lock poisoned");
        responses
            .get(url)
            .cloned()
            .ok_or_else(|| m3u_sync::errors::SourceError::Http {
                status: 404,
                message: "Not Found".to_string(),
            })
    }
}

async fn open(url: String, max_connections: Option<u32>) -> (Database, Arc<SqlitePlaylistRepository>) {
    let database = Database::new(&DatabaseConfig {
        url,
        max_connections,
    })
    .await
    .expect("Failed to open database");
    database.migrate().await.expect("Failed to migrate");

    let repository = Arc::new(SqlitePlaylistRepository::new(&database));
    (database, repository)
}

async fn setup() -> (Database, Arc<SqlitePlaylistRepository>, Arc<ScriptedFetcher>) {
    let (database, repository) = open("sqlite::memory:".to_string(), None).await;
    (database, repository, Arc::new(ScriptedFetcher::default()))
}

/// A pooled database file; the directory must outlive the database
async fn setup_file(
    dir: &tempfile::TempDir,
) -> (Database, Arc<SqlitePlaylistRepository>, Arc<ScriptedFetcher>) {
    let url = format!("sqlite://{}", dir.path().join("sync.db").display());
    let (database, repository) = open(url, Some(8)).await;
    (database, repository, Arc::new(ScriptedFetcher::default()))
}

fn large_playlist(tag: &str, count: usize) -> String {
    let mut content = String::from("#EXTM3U\n");
    for index in 0..count {
        content.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{tag}.{index}\" group-title=\"{tag}\",{tag} {index}\nhttp://streams.example/{tag}/{index}\n"
        ));
    }
    content
}

async fn create_remote(repository: &dyn PlaylistRepository, url: &str) -> Uuid {
    repository
        .create_playlist(PlaylistCreateRequest {
            name: "Upstream".to_string(),
            url: Some(url.to_string()),
            ..Default::default()
        })
        .await
        .expect("Failed to create playlist")
        .id
}

const FIRST_SYNC: &str = r#"#EXTM3U x-tvg-url="http://epg.example/guide.xml"
#EXTINF:-1 tvg-id="one.up" group-title="News",One
http://streams.example/1
#EXTVLCOPT:http-user-agent=Upstream
#EXTINF:-1 tvg-id="two.up" group-title="Sport",Two
http://streams.example/2
"#;

const SECOND_SYNC: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="two.changed" group-title="Sport HD" tvg-logo="http://logos.example/two.png",Two HD
http://streams.example/2
#EXTVLCOPT:fresh-only=1
#EXTINF:-1 tvg-id="three.up",Three
http://streams.example/3
#EXTINF:-1 tvg-id="one.up" group-title="News",One
http://streams.example/1
"#;

#[tokio::test]
async fn test_resync_preserves_user_metadata() {
    let (_db, repository, fetcher) = setup().await;
    let url = "http://upstream.example/list.m3u";
    let playlist_id = create_remote(repository.as_ref(), url).await;
    let service = PlaylistSyncService::new(repository.clone(), fetcher.clone());

    fetcher.set(url, FIRST_SYNC);
    let first = service.sync_playlist(playlist_id).await.expect("First sync failed");
    assert_eq!(first.channel_count, 2);
    assert_eq!(first.epg_url.as_deref(), Some("http://epg.example/guide.xml"));

    // the user annotates channel two between syncs
    let playlists = PlaylistService::new(repository.clone());
    let mut tags = playlists.list_channels(playlist_id).await.unwrap()[1]
        .extra_tags
        .clone();
    assert_eq!(tags["EXTVLCOPT"], "http-user-agent=Upstream");
    tags.insert("EXTVLCOPT".to_string(), "http-user-agent=Mine".to_string());
    tags.insert("user-note".to_string(), "favourite".to_string());
    let edited = playlists
        .update_channel(
            playlist_id,
            2,
            ChannelUpdateRequest {
                tvg_id: Some("two.user".to_string()),
                extra_tags: Some(tags),
                ..Default::default()
            },
        )
        .await
        .expect("Channel edit failed");
    assert_eq!(edited.url, "http://streams.example/2");
    assert_eq!(edited.position, 2);

    fetcher.set(url, SECOND_SYNC);
    let second = service.sync_playlist(playlist_id).await.expect("Second sync failed");
    assert_eq!(second.channel_count, 3);
    assert_eq!(second.preserved_metadata_count, 2);
    // header without EPG keeps the stored one
    assert_eq!(second.epg_url.as_deref(), Some("http://epg.example/guide.xml"));

    let channels = repository.list_channels(playlist_id).await.unwrap();
    let urls: Vec<&str> = channels.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "http://streams.example/2",
            "http://streams.example/3",
            "http://streams.example/1"
        ]
    );
    let positions: Vec<u32> = channels.iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let two = &channels[0];
    assert_eq!(two.name, "Two HD");
    assert_eq!(two.group.as_deref(), Some("Sport HD"));
    assert_eq!(two.logo.as_deref(), Some("http://logos.example/two.png"));
    assert_eq!(two.tvg_id.as_deref(), Some("two.user"));
    assert_eq!(two.extra_tags["EXTVLCOPT"], "http-user-agent=Mine");
    assert_eq!(two.extra_tags["user-note"], "favourite");

    let three = &channels[1];
    assert_eq!(three.tvg_id.as_deref(), Some("three.up"));
    assert_eq!(three.extra_tags["EXTVLCOPT"], "fresh-only=1");

    let exported = playlists.export_m3u(playlist_id).await.unwrap();
    assert!(exported.starts_with("#EXTM3U x-tvg-url=\"http://epg.example/guide.xml\"\n"));
    assert!(exported.contains("#EXTINF:-1 tvg-id=\"two.user\" group-title=\"Sport HD\""));
}

#[tokio::test]
async fn test_failed_replace_leaves_previous_channels() {
    let (db, repository, fetcher) = setup().await;
    let url = "http://upstream.example/list.m3u";
    let playlist_id = create_remote(repository.as_ref(), url).await;
    let service = PlaylistSyncService::new(repository.clone(), fetcher.clone());

    fetcher.set(url, FIRST_SYNC);
    service.sync_playlist(playlist_id).await.expect("Initial sync failed");
    let before = repository.list_channels(playlist_id).await.unwrap();
    let before_playlist = repository.find_playlist(playlist_id).await.unwrap().unwrap();

    // abort the insert of the second channel, after the delete and first insert ran
    sqlx::query(
        "CREATE TRIGGER fail_three BEFORE INSERT ON channels
         WHEN NEW.name = 'Three'
         BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END",
    )
    .execute(&db.pool())
    .await
    .expect("Failed to install trigger");

    fetcher.set(url, SECOND_SYNC);
    let result = service.sync_playlist(playlist_id).await;
    assert!(matches!(
        result,
        Err(AppError::Repository(RepositoryError::ReplaceFailed { .. }))
    ));

    let after = repository.list_channels(playlist_id).await.unwrap();
    assert_eq!(after, before);
    let after_playlist = repository.find_playlist(playlist_id).await.unwrap().unwrap();
    assert_eq!(after_playlist.last_sync, before_playlist.last_sync);
}

#[tokio::test]
async fn test_fetch_failure_is_terminal() {
    let (_db, repository, fetcher) = setup().await;
    let playlist_id = create_remote(repository.as_ref(), "http://missing.example/list.m3u").await;
    let service = PlaylistSyncService::new(repository.clone(), fetcher);

    let result = service.sync_playlist(playlist_id).await;
    assert!(matches!(result, Err(AppError::Source(_))));
    assert!(repository.list_channels(playlist_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_syncs_of_different_playlists() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (_db, repository, fetcher) = setup_file(&dir).await;
    let service = PlaylistSyncService::new(repository.clone(), fetcher.clone());

    let mut playlists = Vec::new();
    for index in 0..8 {
        let url = format!("http://upstream.example/{index}.m3u");
        playlists.push((create_remote(repository.as_ref(), &url).await, url));
    }

    for round in 0..3 {
        for (index, (_, url)) in playlists.iter().enumerate() {
            fetcher.set(url, &large_playlist(&format!("r{round}p{index}"), 2000));
        }
        let handles: Vec<_> = playlists
            .iter()
            .map(|(id, _)| {
                let service = service.clone();
                let id = *id;
                tokio::spawn(async move { service.sync_playlist(id).await })
            })
            .collect();
        for handle in handles {
            let outcome = handle.await.expect("task panicked").expect("sync failed");
            assert_eq!(outcome.channel_count, 2000);
        }
    }

    for (index, (id, _)) in playlists.iter().enumerate() {
        let channels = repository.list_channels(*id).await.unwrap();
        assert_eq!(channels.len(), 2000);
        assert_eq!(channels[0].name, format!("r2p{index} 0"));
        assert_eq!(channels[1999].position, 2000);
    }
}

#[tokio::test]
async fn test_concurrent_syncs_of_one_playlist() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (_db, repository, fetcher) = setup_file(&dir).await;
    let url = "http://upstream.example/shared.m3u";
    let playlist_id = create_remote(repository.as_ref(), url).await;
    fetcher.set(url, &large_playlist("shared", 500));

    let sync = PlaylistSyncService::new(repository.clone(), fetcher.clone());
    let playlists = PlaylistService::new(repository.clone());
    sync.sync_playlist(playlist_id).await.expect("Initial sync failed");
    playlists
        .update_channel(
            playlist_id,
            1,
            ChannelUpdateRequest {
                tvg_id: Some("pinned".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Channel edit failed");

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let sync = sync.clone();
            tokio::spawn(async move { sync.sync_playlist(playlist_id).await })
        })
        .collect();
    for handle in handles {
        let outcome = handle.await.expect("task panicked").expect("sync failed");
        assert_eq!(outcome.channel_count, 500);
        assert_eq!(outcome.preserved_metadata_count, 500);
    }

    let channels = playlists.list_channels(playlist_id).await.unwrap();
    assert_eq!(channels.len(), 500);
    let positions: Vec<u32> = channels.iter().map(|c| c.position).collect();
    assert_eq!(positions, (1..=500).collect::<Vec<u32>>());
    assert_eq!(channels[0].tvg_id.as_deref(), Some("pinned"));
}

#[tokio::test]
async fn test_hand_edits_on_custom_playlist() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (_db, repository, _) = setup_file(&dir).await;
    let playlists = PlaylistService::new(repository.clone());
    let custom = playlists
        .create_playlist(PlaylistCreateRequest {
            name: "Mine".to_string(),
            is_custom: true,
            ..Default::default()
        })
        .await
        .unwrap();

    for index in 1..=3 {
        playlists
            .add_channel(
                custom.id,
                ChannelCreateRequest {
                    name: format!("Mine {index}"),
                    url: format!("http://mine.example/{index}"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    playlists.delete_channel(custom.id, 2).await.unwrap();
    assert_eq!(
        playlists.export_m3u(custom.id).await.unwrap(),
        "#EXTM3U\n#EXTINF:-1,Mine 1\nhttp://mine.example/1\n#EXTINF:-1,Mine 3\nhttp://mine.example/3"
    );

    playlists.delete_playlist(custom.id).await.unwrap();
    assert!(playlists.list_playlists().await.unwrap().is_empty());
    assert!(repository.list_channels(custom.id).await.unwrap().is_empty());
}

/// Delegates to an in-memory store but refuses every replace
struct RejectingRepository {
    inner: InMemoryPlaylistRepository,
}

#[async_trait]
impl PlaylistRepository for RejectingRepository {
    async fn create_playlist(&self, request: PlaylistCreateRequest) -> RepositoryResult<Playlist> {
        self.inner.create_playlist(request).await
    }

    async fn find_playlist(&self, playlist_id: Uuid) -> RepositoryResult<Option<Playlist>> {
        self.inner.find_playlist(playlist_id).await
    }

    async fn list_playlists(&self) -> RepositoryResult<Vec<Playlist>> {
        self.inner.list_playlists().await
    }

    async fn delete_playlist(&self, playlist_id: Uuid) -> RepositoryResult<()> {
        self.inner.delete_playlist(playlist_id).await
    }

    async fn list_channels(&self, playlist_id: Uuid) -> RepositoryResult<Vec<Channel>> {
        self.inner.list_channels(playlist_id).await
    }

    async fn load_prior_metadata(
        &self,
        playlist_id: Uuid,
    ) -> RepositoryResult<HashMap<String, ChannelMetadata>> {
        self.inner.load_prior_metadata(playlist_id).await
    }

    async fn replace_channels(
        &self,
        playlist_id: Uuid,
        _channels: &[Channel],
    ) -> RepositoryResult<usize> {
        Err(RepositoryError::replace_failed(playlist_id, "disk full"))
    }

    async fn mark_synced(
        &self,
        playlist_id: Uuid,
        epg_url: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.inner.mark_synced(playlist_id, epg_url, synced_at).await
    }

    async fn add_channel(
        &self,
        playlist_id: Uuid,
        request: ChannelCreateRequest,
    ) -> RepositoryResult<Channel> {
        self.inner.add_channel(playlist_id, request).await
    }

    async fn update_channel(
        &self,
        playlist_id: Uuid,
        position: u32,
        update: ChannelUpdateRequest,
    ) -> RepositoryResult<Channel> {
        self.inner.update_channel(playlist_id, position, update).await
    }

    async fn delete_channel(&self, playlist_id: Uuid, position: u32) -> RepositoryResult<()> {
        self.inner.delete_channel(playlist_id, position).await
    }
}

#[tokio::test]
async fn test_replace_failure_is_reported_and_not_stamped() {
    let repository = Arc::new(RejectingRepository {
        inner: InMemoryPlaylistRepository::new(),
    });
    let fetcher = Arc::new(ScriptedFetcher::default());
    let url = "http://upstream.example/list.m3u";
    fetcher.set(url, FIRST_SYNC);
    let playlist_id = create_remote(repository.as_ref(), url).await;

    let service = PlaylistSyncService::new(repository.clone(), fetcher);
    let result = service.sync_playlist(playlist_id).await;
    assert!(matches!(result, Err(AppError::Repository(_))));

    let playlist = repository.find_playlist(playlist_id).await.unwrap().unwrap();
    assert_eq!(playlist.last_sync, None);
    assert_eq!(playlist.epg_url, None);
    assert!(repository.list_channels(playlist_id).await.unwrap().is_empty());
}
