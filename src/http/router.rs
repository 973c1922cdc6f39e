//! Path matching for the `/v1` API.

/// The collections the API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Company,
    Warehouse,
    Rack,
    Brand,
    BrandModel,
    Stock,
}

impl Collection {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "perusahaans" => Some(Collection::Company),
            "warehouse" => Some(Collection::Warehouse),
            "rak" => Some(Collection::Rack),
            "brand" => Some(Collection::Brand),
            "brandasset" => Some(Collection::BrandModel),
            "stok" => Some(Collection::Stock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Healthcheck,
    Metrics,
    /// `/v1/<collection>`
    List(Collection),
    /// `/v1/<collection>/<id>`; the id is left unparsed.
    Item(Collection, String),
}

pub fn route(path: &str) -> Option<Route> {
    if path == "/metrics" {
        return Some(Route::Metrics);
    }
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    if segments.next()? != "v1" {
        return None;
    }
    let name = segments.next()?;
    let id = segments.next();
    if segments.next().is_some() {
        return None;
    }
    match (name, id) {
        ("healthcheck", None) => Some(Route::Healthcheck),
        (name, None) => Collection::from_segment(name).map(Route::List),
        (name, Some(id)) => {
            Collection::from_segment(name).map(|c| Route::Item(c, id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_and_items() {
        assert_eq!(route("/v1/stok"), Some(Route::List(Collection::Stock)));
        assert_eq!(route("/v1/stok/"), Some(Route::List(Collection::Stock)));
        assert_eq!(
            route("/v1/stok/4f1c2a"),
            Some(Route::Item(Collection::Stock, "4f1c2a".to_string()))
        );
        assert_eq!(
            route("/v1/brandasset/7"),
            Some(Route::Item(Collection::BrandModel, "7".to_string()))
        );
        assert_eq!(route("/v1/perusahaans"), Some(Route::List(Collection::Company)));
    }

    #[test]
    fn test_service_routes() {
        assert_eq!(route("/v1/healthcheck"), Some(Route::Healthcheck));
        assert_eq!(route("/metrics"), Some(Route::Metrics));
    }

    #[test]
    fn test_unknown_paths() {
        assert_eq!(route("/"), None);
        assert_eq!(route("/v2/stok"), None);
        assert_eq!(route("/v1/produk"), None);
        assert_eq!(route("/v1/stok/1/detail"), None);
        assert_eq!(route("/v1/healthcheck/1"), None);
    }
}
