//! In-memory stand-ins for the Postgres repositories, plus router wiring.

#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use qubit::application::auth::{
    AuthService, BcryptHasher, CredentialService, LoginRateLimiter, NewUser, SessionService,
};
use qubit::application::feed::FeedService;
use qubit::application::posts::PostService;
use qubit::application::render::ComrakRenderer;
use qubit::application::repos::{
    CreateFeedEntryParams, CreatePostParams, CreateUserParams, DeletedPost, FeedRepo, HealthRepo,
    PostListFilter, PostsRepo, PostsWriteRepo, RepoError, SearchResults, TagsRepo,
    UpdatePostParams, UpdatedPost, UsersRepo,
};
use qubit::cache::{ContentCache, DEFAULT_TTL, MemoryCacheBackend};
use qubit::config::AuthorSettings;
use qubit::domain::entities::{
    AuthRecord, FeedEntryRecord, PostRecord, TagWithCount, UserRecord,
};
use qubit::domain::posts::{PublicationState, next_published_at};
use qubit::infra::http::{AppState, build_router, cookie_key};

pub const PASSWORD: &str = "correct-horse";

#[derive(Default)]
pub struct MemoryUsers {
    next_id: AtomicI32,
    rows: Mutex<Vec<AuthRecord>>,
}

#[async_trait]
impl UsersRepo for MemoryUsers {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut rows = self.rows.lock().await;
        if rows
            .iter()
            .any(|r| r.user.username == params.username || r.user.email == params.email)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".into(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            username: params.username,
            email: params.email,
            display_name: params.display_name,
            bio: params.bio,
            is_active: true,
            is_admin: params.is_admin,
            created_at: now,
            updated_at: now,
        };
        rows.push(AuthRecord {
            user: user.clone(),
            password_hash: params.password_hash,
        });
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .find_by_username(username)
            .await?
            .map(|record| record.user))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<AuthRecord>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|r| r.user.username == username).cloned())
    }

    async fn set_admin(&self, username: &str, is_admin: bool) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| r.user.username == username)
            .ok_or(RepoError::NotFound)?;
        row.user.is_admin = is_admin;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| r.user.username == username)
            .ok_or(RepoError::NotFound)?;
        row.password_hash = password_hash.to_string();
        Ok(())
    }
}

/// Posts held in memory. Reads are counted so tests can observe cache hits.
#[derive(Default)]
pub struct MemoryPosts {
    rows: Mutex<Vec<PostRecord>>,
    pub reads: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl MemoryPosts {
    fn check_available(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("connection refused".into()));
        }
        Ok(())
    }

    fn record_read(&self) -> Result<(), RepoError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    fn matching(rows: &[PostRecord], filter: PostListFilter) -> Vec<PostRecord> {
        let mut matched: Vec<PostRecord> = rows
            .iter()
            .filter(|p| filter.published.is_none_or(|published| p.published == published))
            .filter(|p| filter.author_id.is_none_or(|author| p.author_id == author))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

fn window<T: Clone>(items: &[T], limit: u32, offset: u64) -> Vec<T> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl PostsRepo for MemoryPosts {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        self.record_read()?;
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|p| p.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.record_read()?;
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|p| p.id == id).cloned())
    }

    async fn list_posts(
        &self,
        filter: PostListFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.record_read()?;
        let rows = self.rows.lock().await;
        Ok(window(&Self::matching(&rows, filter), limit, offset))
    }

    async fn count_posts(&self, filter: PostListFilter) -> Result<u64, RepoError> {
        self.check_available()?;
        let rows = self.rows.lock().await;
        Ok(Self::matching(&rows, filter).len() as u64)
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        offset: u64,
    ) -> Result<SearchResults, RepoError> {
        self.record_read()?;
        let needle = query.to_lowercase();
        let rows = self.rows.lock().await;
        let matched: Vec<PostRecord> = Self::matching(&rows, PostListFilter::published())
            .into_iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.content.to_lowercase().contains(&needle)
            })
            .collect();
        Ok(SearchResults {
            total: matched.len() as u64,
            posts: window(&matched, limit, offset),
        })
    }

    async fn slug_exists(&self, slug: &str, excluding: Option<Uuid>) -> Result<bool, RepoError> {
        self.check_available()?;
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != excluding))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryPosts {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|p| p.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "idx_posts_slug".into(),
            });
        }
        let post = PostRecord {
            id: params.id,
            title: params.title,
            content: params.content,
            content_html: params.content_html,
            slug: params.slug,
            published: params.published,
            published_at: next_published_at(None, params.published, params.now),
            author_id: params.author_id,
            tags: params.tags,
            created_at: params.now,
            updated_at: params.now,
        };
        rows.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<UpdatedPost, RepoError> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        if rows
            .iter()
            .any(|p| p.slug == params.slug && p.id != params.id)
        {
            return Err(RepoError::Duplicate {
                constraint: "idx_posts_slug".into(),
            });
        }
        let post = rows
            .iter_mut()
            .find(|p| p.id == params.id)
            .ok_or(RepoError::NotFound)?;

        let previous_slug = std::mem::replace(&mut post.slug, params.slug);
        post.published_at = next_published_at(
            Some(PublicationState {
                published: post.published,
                published_at: post.published_at,
            }),
            params.published,
            params.now,
        );
        post.title = params.title;
        post.content = params.content;
        post.content_html = params.content_html;
        post.published = params.published;
        post.tags = params.tags;
        post.updated_at = params.now;

        Ok(UpdatedPost {
            post: post.clone(),
            previous_slug,
        })
    }

    async fn delete_post(&self, id: Uuid) -> Result<DeletedPost, RepoError> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        let index = rows
            .iter()
            .position(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        let removed = rows.remove(index);
        Ok(DeletedPost {
            id: removed.id,
            slug: removed.slug,
        })
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<DeletedPost>, RepoError> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        if !ids.iter().all(|id| rows.iter().any(|p| p.id == *id)) {
            return Err(RepoError::NotFound);
        }
        let mut deleted = Vec::with_capacity(ids.len());
        rows.retain(|p| {
            if ids.contains(&p.id) {
                deleted.push(DeletedPost {
                    id: p.id,
                    slug: p.slug.clone(),
                });
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }
}

#[derive(Default)]
pub struct MemoryFeed(Mutex<Vec<FeedEntryRecord>>);

#[async_trait]
impl FeedRepo for MemoryFeed {
    async fn create_entry(
        &self,
        params: CreateFeedEntryParams,
    ) -> Result<FeedEntryRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let entry = FeedEntryRecord {
            id: params.id,
            content: params.content,
            author_id: params.author_id,
            author_name: params.author_name,
            created_at: now,
            updated_at: now,
        };
        self.0.lock().await.insert(0, entry.clone());
        Ok(entry)
    }

    async fn list_entries(
        &self,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<FeedEntryRecord>, RepoError> {
        Ok(window(&self.0.lock().await, limit, offset))
    }

    async fn count_entries(&self) -> Result<u64, RepoError> {
        Ok(self.0.lock().await.len() as u64)
    }

    async fn delete_entry(&self, id: Uuid) -> Result<(), RepoError> {
        let mut entries = self.0.lock().await;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

/// Tag counts derived from the posts fake.
pub struct DerivedTags(pub Arc<MemoryPosts>);

#[async_trait]
impl TagsRepo for DerivedTags {
    async fn list_tags(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = self.0.rows.lock().await;
        let mut tags: Vec<TagWithCount> = Vec::new();
        for post in rows.iter() {
            for name in &post.tags {
                let position = match tags.iter().position(|tag| &tag.name == name) {
                    Some(position) => position,
                    None => {
                        tags.push(TagWithCount {
                            id: tags.len() as i32 + 1,
                            name: name.clone(),
                            description: None,
                            published_posts: 0,
                        });
                        tags.len() - 1
                    }
                };
                if post.published {
                    tags[position].published_posts += 1;
                }
            }
        }
        Ok(tags)
    }
}

#[derive(Default)]
pub struct Health {
    pub down: AtomicBool,
}

#[async_trait]
impl HealthRepo for Health {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

pub fn memory_cache() -> ContentCache {
    let backend = MemoryCacheBackend::new(NonZeroUsize::new(256).expect("non-zero"));
    ContentCache::new(Arc::new(backend), DEFAULT_TTL)
}

pub fn post_service(posts: Arc<MemoryPosts>) -> PostService {
    PostService::new(
        posts.clone(),
        posts,
        memory_cache(),
        Arc::new(ComrakRenderer::new()),
    )
}

/// A fully wired application over in-memory fakes.
pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUsers>,
    pub posts: Arc<MemoryPosts>,
    pub health: Arc<Health>,
    pub credentials: Arc<CredentialService>,
}

impl TestApp {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUsers::default());
        let posts = Arc::new(MemoryPosts::default());
        let health = Arc::new(Health::default());

        let credentials = Arc::new(CredentialService::new(
            users.clone(),
            Arc::new(BcryptHasher::new(4)),
        ));
        let sessions = Arc::new(SessionService::new(
            users.clone(),
            time::Duration::minutes(30),
        ));
        let auth = Arc::new(AuthService::new(
            credentials.clone(),
            sessions,
            LoginRateLimiter::per_minute(15),
        ));

        let state = AppState {
            auth,
            posts: Arc::new(post_service(posts.clone())),
            feed: Arc::new(FeedService::new(Arc::new(MemoryFeed::default()))),
            tags: Arc::new(DerivedTags(posts.clone())),
            health: health.clone(),
            author: Arc::new(AuthorSettings {
                name: "Ada Lovelace".into(),
                short_name: "ada".into(),
                bio: "Writes about engines & notes.".into(),
                github: Some("ada".into()),
                website: None,
            }),
            cookie_key: cookie_key("test-secret"),
        };

        Self {
            router: build_router(state),
            users,
            posts,
            health,
            credentials,
        }
    }

    pub async fn register(&self, username: &str, is_admin: bool) -> UserRecord {
        self.credentials
            .register(NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                password: PASSWORD.into(),
                display_name: None,
                bio: None,
                is_admin,
            })
            .await
            .expect("register user")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Log in through the form endpoint and return the session cookie pair.
    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        let form = format!("username={username}&password={password}");
        self.send(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .expect("request"),
        )
        .await
    }

    pub async fn session_for(&self, username: &str, is_admin: bool) -> String {
        self.register(username, is_admin).await;
        let response = self.login(username, PASSWORD).await;
        cookie_pairs(response.headers())
    }
}

/// `name=value` pairs from every `Set-Cookie`, joined for a `Cookie` header.
pub fn cookie_pairs(headers: &HeaderMap) -> String {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn json_request(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}
