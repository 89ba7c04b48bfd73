//! Demo todo application served from an in-process tab.
//!
//! Shows the registration API end to end: a page rendered by a pure
//! `(data) -> String` function, a JSON API mounted as a plugin under
//! `/api`, and hooks on the request lifecycle.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::RouterConfig;
use crate::consumer::{ConsumerOptions, ConsumerSession, RegisterOptions};
use crate::error::{BoxError, RouterResult};
use crate::hooks::Hook;
use crate::http::{Body, Reply, Request};
use crate::interception::{InterceptionPoint, Tab, TabHost};
use crate::transport::BroadcastBus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub done: bool,
}

#[derive(Debug, Deserialize)]
struct NewTodo {
    title: String,
}

/// In-memory todo list.
#[derive(Debug, Clone, Default)]
pub struct TodoStore {
    todos: Arc<DashMap<u64, Todo>>,
    next_id: Arc<AtomicU64>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, title: impl Into<String>) -> Todo {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let todo = Todo {
            id,
            title: title.into(),
            done: false,
        };
        self.todos.insert(id, todo.clone());
        todo
    }

    pub fn get(&self, id: u64) -> Option<Todo> {
        self.todos.get(&id).map(|entry| entry.value().clone())
    }

    pub fn toggle(&self, id: u64) -> Option<Todo> {
        let mut entry = self.todos.get_mut(&id)?;
        entry.done = !entry.done;
        Some(entry.clone())
    }

    pub fn remove(&self, id: u64) -> Option<Todo> {
        self.todos.remove(&id).map(|(_, todo)| todo)
    }

    /// All todos, oldest first.
    pub fn list(&self) -> Vec<Todo> {
        let mut todos: Vec<Todo> = self.todos.iter().map(|entry| entry.value().clone()).collect();
        todos.sort_by_key(|todo| todo.id);
        todos
    }
}

/// Data rendered by [`render_page`].
#[derive(Debug, Clone, Serialize)]
pub struct TodoPage {
    pub title: String,
    pub todos: Vec<Todo>,
}

/// Render the todo page as HTML.
pub fn render_page(page: &TodoPage) -> String {
    let items: String = page
        .todos
        .iter()
        .map(|todo| {
            format!(
                "<li data-id=\"{}\" class=\"{}\">{}</li>",
                todo.id,
                if todo.done { "done" } else { "open" },
                escape_html(&todo.title)
            )
        })
        .collect();
    let remaining = page.todos.iter().filter(|todo| !todo.done).count();

    format!(
        "<!doctype html><html><head><title>{title}</title></head><body>\
         <h1>{title}</h1><ul>{items}</ul><p>{remaining} remaining</p>\
         <form method=\"post\" action=\"/api/todos\"><input name=\"title\"><button>Add</button></form>\
         </body></html>",
        title = escape_html(&page.title),
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn todo_id(req: &Request) -> Option<u64> {
    req.params.get("id").and_then(|id| id.parse().ok())
}

fn missing(reply: &mut Reply) -> Result<Option<Body>, BoxError> {
    *reply = Reply::error(404, "Todo not found");
    Ok(None)
}

/// Title from a decoded form or a JSON body.
fn new_title(req: &Request) -> Result<String, BoxError> {
    if let Some(form) = req.form() {
        return form
            .get("title")
            .cloned()
            .ok_or_else(|| "form field 'title' is required".into());
    }
    let todo: NewTodo = req.json()?;
    Ok(todo.title)
}

/// Register the page, the `/api` plugin and the demo hooks on `session`.
pub async fn install(session: &ConsumerSession, store: TodoStore) -> RouterResult<()> {
    let consumer_id = session.id().to_string();
    session.add_hook(Hook::on_response(move |_req, reply| {
        let consumer_id = consumer_id.clone();
        Box::pin(async move {
            reply.headers.insert_default("x-served-by", consumer_id);
            Ok(())
        })
    }));

    let page_store = store.clone();
    session.get("/", move |_req, _reply| {
        let store = page_store.clone();
        Box::pin(async move {
            let page = TodoPage {
                title: "Todos".to_string(),
                todos: store.list(),
            };
            Ok(Some(Body::Text(render_page(&page))))
        })
    });

    session
        .register(
            move |api| async move {
                let list = store.clone();
                api.get("/todos", move |_req, _reply| {
                    let store = list.clone();
                    Box::pin(async move { Ok(Some(Body::json(&store.list())?)) })
                });

                let show = store.clone();
                api.get("/todos/:id", move |req, reply| {
                    let store = show.clone();
                    Box::pin(async move {
                        match todo_id(req).and_then(|id| store.get(id)) {
                            Some(todo) => Ok(Some(Body::json(&todo)?)),
                            None => missing(reply),
                        }
                    })
                });

                let create = store.clone();
                api.post("/todos", move |req, reply| {
                    let store = create.clone();
                    Box::pin(async move {
                        let todo = store.add(new_title(req)?);
                        reply.status(201);
                        Ok(Some(Body::json(&todo)?))
                    })
                });

                let toggle = store.clone();
                api.post("/todos/:id/toggle", move |req, reply| {
                    let store = toggle.clone();
                    Box::pin(async move {
                        match todo_id(req).and_then(|id| store.toggle(id)) {
                            Some(todo) => Ok(Some(Body::json(&todo)?)),
                            None => missing(reply),
                        }
                    })
                });

                let remove = store.clone();
                api.delete("/todos/:id", move |req, reply| {
                    let store = remove.clone();
                    Box::pin(async move {
                        match todo_id(req).and_then(|id| store.remove(id)) {
                            Some(todo) => Ok(Some(Body::json(&todo)?)),
                            None => missing(reply),
                        }
                    })
                });
                Ok::<(), BoxError>(())
            },
            RegisterOptions::prefix("/api"),
        )
        .await
}

/// Open the demo tab and start its consumer session.
pub async fn open_demo_tab(
    config: &RouterConfig,
    bus: &BroadcastBus,
    host: &TabHost,
    point: &Arc<InterceptionPoint>,
) -> RouterResult<(ConsumerSession, Tab)> {
    let tab = host.open_tab_with_id(config.demo.client_id.clone(), point);
    let session = ConsumerSession::new(bus, Arc::new(tab.clone()), ConsumerOptions::from_config(config));

    let store = TodoStore::new();
    store.add("Read the routing docs");
    install(&session, store).await?;
    session.listen().await?;

    tracing::info!(client_id = %tab.client_id(), consumer_id = %session.id(), "Demo tab ready");
    Ok((session, tab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    const ORIGIN: &str = "http://localhost:8080";

    #[test]
    fn test_render_page_escapes_titles() {
        let page = TodoPage {
            title: "Todos".into(),
            todos: vec![Todo {
                id: 1,
                title: "<script>".into(),
                done: false,
            }],
        };
        let html = render_page(&page);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("1 remaining"));
    }

    #[tokio::test]
    async fn test_demo_routes_through_dispatcher() {
        let session = ConsumerSession::new(
            &BroadcastBus::default(),
            Arc::new(TablessFetcher),
            ConsumerOptions::default(),
        );
        install(&session, TodoStore::new()).await.unwrap();
        let dispatcher = session.dispatcher();

        let created = dispatcher
            .dispatch(
                Request::new(Method::Post, format!("{ORIGIN}/api/todos"))
                    .with_header("content-type", "application/x-www-form-urlencoded")
                    .with_body("title=Write+tests"),
            )
            .await
            .unwrap();
        assert_eq!(created.status, 201);
        assert_eq!(created.headers.get("x-served-by"), Some(session.id()));

        let shown = dispatcher
            .dispatch(Request::new(Method::Get, format!("{ORIGIN}/api/todos/1")))
            .await
            .unwrap();
        let Some(Body::Json(todo)) = shown.body else {
            panic!("expected a JSON todo");
        };
        assert_eq!(todo["title"], "Write tests");

        let missing = dispatcher
            .dispatch(Request::new(Method::Delete, format!("{ORIGIN}/api/todos/9")))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        let page = dispatcher
            .dispatch(Request::new(Method::Get, format!("{ORIGIN}/")))
            .await
            .unwrap();
        assert_eq!(page.headers.get("content-type"), Some("text/html"));
    }

    struct TablessFetcher;

    impl crate::interception::Fetcher for TablessFetcher {
        fn fetch(&self, request: Request) -> futures_util::future::BoxFuture<'_, RouterResult<Reply>> {
            Box::pin(async move { Err(crate::error::RouterError::NotIntercepted { url: request.url }) })
        }
    }
}
