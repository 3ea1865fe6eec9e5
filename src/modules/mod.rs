pub mod books;

use readlog_db::Database;
use readlog_kernel::{settings::Settings, ModuleRegistry};

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, db: &Database, settings: &Settings) {
    let store = books::BookStore::new(db.pool().clone());
    registry.register(std::sync::Arc::new(books::BooksModule::new(
        store,
        settings.books.patch_policy,
    )));
}
