use crate::models::FileType;

/// Listing page a file type is shown on.
pub fn listing_route(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Video | FileType::Audio => "/media",
        FileType::Image => "/images",
        FileType::Document => "/documents",
        FileType::Other => "/others",
    }
}

/// File types listed on a page, the inverse of [`listing_route`].
pub fn types_for_route(route: &str) -> Vec<FileType> {
    match route.trim_matches('/') {
        "media" => vec![FileType::Video, FileType::Audio],
        "images" => vec![FileType::Image],
        "documents" => vec![FileType::Document],
        "others" => vec![FileType::Other],
        _ => Vec::new(),
    }
}

fn split_location(location: &str) -> (&str, &str) {
    location.split_once('?').unwrap_or((location, ""))
}

fn parse_params(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(query).unwrap_or_default()
}

fn join(path: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    match serde_urlencoded::to_string(params) {
        Ok(encoded) => format!("{}?{}", path, encoded),
        Err(_) => path.to_string(),
    }
}

/// `path` with `?query=<text>` appended.
pub fn with_query(path: &str, text: &str) -> String {
    join(path, &[("query".to_string(), text.to_string())])
}

/// Value of the `query` parameter of `location`, if any.
pub fn query_param(location: &str) -> Option<String> {
    let (_, query) = split_location(location);
    parse_params(query)
        .into_iter()
        .find(|(k, _)| k == "query")
        .map(|(_, v)| v)
}

/// `location` without its `query` parameter; other parameters are kept.
pub fn strip_query_param(location: &str) -> String {
    let (path, query) = split_location(location);
    let params: Vec<(String, String)> = parse_params(query)
        .into_iter()
        .filter(|(k, _)| k != "query")
        .collect();
    join(path, &params)
}
