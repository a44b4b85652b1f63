//! CouchDB endpoint URL builders

/// Suffix of the bulk document endpoint
pub const BULK_DOCS_PATH: &str = "_bulk_docs";

fn base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Build the database URL used for probe and create
pub fn collection_url(base_url: &str, collection: &str) -> String {
    format!("{}/{}", base(base_url), urlencoding::encode(collection))
}

/// Build the bulk document URL
pub fn bulk_docs_url(base_url: &str, collection: &str) -> String {
    format!("{}/{}", collection_url(base_url, collection), BULK_DOCS_PATH)
}
