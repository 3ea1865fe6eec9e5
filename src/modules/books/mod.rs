pub mod handlers;
pub mod models;
pub mod store;

use async_trait::async_trait;
use axum::{
    routing::{get, post, put},
    Router,
};
use readlog_kernel::{settings::PatchPolicy, InitCtx, Migration, Module};
use serde_json::json;

use handlers::BooksState;
pub use store::{BookStore, StoreError};

/// Reading records: create, list, look up by title, update, finish, delete
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(store: BookStore, policy: PatchPolicy) -> Self {
        Self {
            state: BooksState { store, policy },
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    fn base_path(&self) -> String {
        "/".to_string()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let records = self.state.store.count().await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            patch_policy = ?self.state.policy,
            records,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/books", get(handlers::list_books))
            .route(
                "/books/{title}",
                get(handlers::get_book)
                    .put(handlers::update_book)
                    .delete(handlers::delete_book),
            )
            .route("/books/finish/{title}", put(handlers::finish_book))
            .route("/addReading", post(handlers::add_reading))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let title_param = json!({
            "name": "title",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        });
        let not_found = json!({
            "description": "Book wasn't find",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });
        let conflict = json!({
            "description": "Title already recorded",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });

        Some(json!({
            "paths": {
                "/books": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "All recorded books",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookList" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/books/{title}": {
                    "get": {
                        "summary": "Get a book by title",
                        "tags": ["Books"],
                        "parameters": [title_param.clone()],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookRecord" }
                                    }
                                }
                            },
                            "404": not_found.clone()
                        }
                    },
                    "put": {
                        "summary": "Update the supplied fields of a book",
                        "tags": ["Books"],
                        "parameters": [title_param.clone()],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookUpdate" }
                                }
                            }
                        },
                        "responses": {
                            "204": { "description": "Updated" },
                            "404": not_found.clone(),
                            "409": conflict.clone()
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [title_param.clone()],
                        "responses": {
                            "204": { "description": "Deleted" },
                            "404": not_found.clone()
                        }
                    }
                },
                "/books/finish/{title}": {
                    "put": {
                        "summary": "Mark a book as finished",
                        "tags": ["Books"],
                        "parameters": [title_param],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookUpdateFinish" }
                                }
                            }
                        },
                        "responses": {
                            "204": { "description": "Updated" },
                            "404": not_found
                        }
                    }
                },
                "/addReading": {
                    "post": {
                        "summary": "Record a new reading",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookBody" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Recorded",
                                "content": {
                                    "application/json": { "schema": { "type": "string" } }
                                }
                            },
                            "409": conflict
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "BookRecord": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "description": "Identifier assigned by the store" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "pages": { "type": "integer" },
                            "start": { "type": "string", "description": "DD/MM/YYYY" },
                            "end": { "type": "string", "description": "DD/MM/YYYY, empty while unfinished" },
                            "score": { "type": "integer", "description": "-1 while unscored" }
                        },
                        "required": ["id", "title", "author", "pages", "start", "end", "score"]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "books": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/BookRecord" }
                            }
                        },
                        "required": ["books"]
                    },
                    "BookBody": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "pages": { "type": "integer" },
                            "start": { "type": "string", "description": "Defaults to today" },
                            "end": { "type": "string" },
                            "score": { "type": "integer" }
                        },
                        "required": ["title", "author", "pages"]
                    },
                    "BookUpdate": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "pages": { "type": "integer" },
                            "start": { "type": "string" },
                            "end": { "type": "string" },
                            "score": { "type": "integer" }
                        }
                    },
                    "BookUpdateFinish": {
                        "type": "object",
                        "properties": {
                            "end": { "type": "string" },
                            "score": { "type": "integer" }
                        }
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        store::MIGRATIONS.to_vec()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}
