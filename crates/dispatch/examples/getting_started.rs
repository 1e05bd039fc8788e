use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use micro_dispatch::container::{Container, Injectable, Resolver};
use micro_dispatch::extract::{Form, Json, Path, Query, Service};
use micro_dispatch::router::GroupOptions;
use micro_dispatch::{
    handler_fn, middleware_fn, redirect, Action, App, AppConfig, ContainerError, Controller, DispatchError, DispatchResult,
    MiddlewareRef, Next, Reply, Request, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Serialize, Clone, Debug)]
pub struct Post {
    id: u64,
    title: String,
}

#[derive(Default)]
pub struct PostStore {
    posts: Mutex<Vec<Post>>,
}

impl PostStore {
    fn insert(&self, title: String) -> Post {
        let mut posts = self.posts.lock().unwrap();
        let post = Post { id: posts.len() as u64 + 1, title };
        posts.push(post.clone());
        post
    }

    fn find(&self, id: u64) -> Option<Post> {
        self.posts.lock().unwrap().iter().find(|post| post.id == id).cloned()
    }

    fn all(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

pub struct PostController {
    store: Arc<PostStore>,
}

impl Injectable for PostController {
    fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
        Ok(PostController { store: resolver.resolve::<PostStore>()? })
    }
}

#[async_trait]
impl Controller for PostController {
    async fn call(&self, method: &str, req: Request, _container: &Container) -> DispatchResult<Reply> {
        match method {
            "index" => Ok(Reply::Json(serde_json::to_value(self.store.all())?)),
            "show" => {
                let id = req.param("id").and_then(|id| id.parse().ok()).unwrap_or_default();
                Ok(self.store.find(id).map_or(Reply::Nothing, |post| Reply::Html(format!("<h1>{}</h1>", post.title))))
            }
            other => Err(DispatchError::unknown_method("PostController", other)),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct NewPost {
    title: String,
}

// POST /admin/posts with body `title=hello`
async fn create_post(Form(new_post): Form<NewPost>, Service(store): Service<PostStore>) -> Json<Post> {
    Json(store.insert(new_post.title))
}

#[derive(Deserialize, Debug)]
pub struct Search {
    q: Option<String>,
}

async fn search(Query(search): Query<Search>) -> String {
    format!("searching for {:?}", search.q)
}

#[derive(Deserialize, Debug)]
pub struct Slug {
    slug: String,
}

async fn page(Path(page): Path<Slug>) -> Option<String> {
    (page.slug == "about").then(|| "<p>about this blog</p>".to_owned())
}

async fn fallback_page() -> &'static str {
    "<p>page not written yet</p>"
}

fn router() -> Result<Router, micro_dispatch::PatternError> {
    let authenticated = middleware_fn(|req: Request, next: Next| async move {
        if req.headers().contains_key(http::header::AUTHORIZATION) {
            next.run(req).await
        } else {
            redirect("/login", StatusCode::FOUND)
        }
    });

    let mut router = Router::new();
    router.get("/posts", Action::controller::<PostController>("index"))?.name("posts.index");
    router.get("/posts/{id}", Action::controller::<PostController>("show"))?.name("posts.show");
    router.get("/search", handler_fn(search))?;
    router.get("/{slug}", handler_fn(page))?;
    router.get("/{slug}", handler_fn(fallback_page))?;

    router.group(
        GroupOptions::new().prefix("/admin").middleware([MiddlewareRef::from(authenticated)]).name("admin."),
        |r| {
            r.post("/posts", handler_fn(create_post))?.name("posts.store");
            Ok(())
        },
    )?;

    Ok(router)
}

fn request(method: Method, uri: &str, body: &'static str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_WWW_FORM_URLENCODED.as_ref())
        .header(http::header::AUTHORIZATION, "Bearer demo")
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut container = Container::new();
    container.singleton::<PostStore, _>(|_| Ok(Arc::new(PostStore::default())));

    let app = App::builder()
        .router(router().unwrap())
        .container(container)
        .config(AppConfig::from_env())
        .config_file("app", serde_json::json!({"name": "micro blog"}))
        .build();

    info!(name = ?app.config_value("app.name"), store = %app.url("admin.posts.store", &[]).unwrap(), "demo app");

    let requests = [
        request(Method::POST, "/admin/posts", "title=hello+world"),
        request(Method::GET, "/posts", ""),
        request(Method::GET, "/posts/1", ""),
        request(Method::GET, "/posts/2", ""),
        request(Method::GET, "/search?q=rust", ""),
        request(Method::GET, "/about", ""),
        request(Method::GET, "/contact", ""),
        request(Method::DELETE, "/posts/1", ""),
        http::Request::post("/admin/posts").body(Bytes::new()).unwrap(),
    ];

    for req in requests {
        let line = format!("{} {}", req.method(), req.uri());
        let response = app.handle(req).await;
        let body = response.body().as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
        println!("{line} -> {} {body}", response.status());
    }
}
