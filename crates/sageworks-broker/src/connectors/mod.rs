//! Built-in connectors

mod directory;

pub use directory::DirectoryConnector;

use crate::category::Category;
use crate::config::BrokerConfig;
use crate::connector::{Connector, ConnectorTable};
use std::path::Path;
use std::sync::Arc;

/// Connector table reading every category from a local mirror
///
/// Layout: `<root>/<bucket>/<category path segment>/...`. The data catalog
/// is limited to the configured database scope.
#[must_use]
pub fn local_mirror(root: &Path, config: &BrokerConfig) -> ConnectorTable {
    ConnectorTable::from_fn(|category| {
        let dir = root.join(&config.bucket).join(category.path_segment());
        let connector = DirectoryConnector::new(category.as_str(), dir);
        let connector = if category == Category::DataCatalog {
            connector.with_scope(config.database_scope.clone())
        } else {
            connector
        };
        Arc::new(connector) as Arc<dyn Connector>
    })
}
