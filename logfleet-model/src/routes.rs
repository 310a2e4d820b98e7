macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

/// Versioned API route definitions shared by the control plane, workers and
/// their HTTP clients.
pub mod v1 {
    pub const ROOT: &str = "/api/v1";
    pub const VERSION: &str = "v1";

    pub mod registry {
        pub const COLLECTION: &str = v1_path!("/registry");
        pub const ITEM: &str = v1_path!("/registry/{identifier}");
        pub const UNREGISTER: &str = v1_path!("/unregister");
    }

    pub mod dispatch {
        pub const NEXT: &str = v1_path!("/dispatch/next");
    }

    pub mod logs {
        pub const COLLECTION: &str = v1_path!("/logs");
    }

    pub mod agent {
        pub const STATUS: &str = v1_path!("/registration");
    }
}

pub const HEALTH: &str = "/health";
pub const PING: &str = "/ping";
pub const REPLICATE: &str = "/replicate";

/// Strip the `/api/v1` prefix so a route can be mounted under a nested router.
pub fn relative_to_v1(path: &str) -> &str {
    path.strip_prefix(v1::ROOT).unwrap_or(path)
}
