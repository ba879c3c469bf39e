pub struct Asset {
    pub body: &'static [u8],
    pub content_type: &'static str,
}

macro_rules! asset {
    ($path:literal, $mime:literal) => {
        Asset {
            body: include_bytes!($path),
            content_type: $mime,
        }
    };
}

pub const INDEX_HTML: &str = include_str!("static/index.html");

pub fn get(path: &str) -> Option<Asset> {
    match path {
        "app.js" => Some(asset!(
            "static/app.js",
            "application/javascript; charset=utf-8"
        )),
        "styles.css" => Some(asset!("static/styles.css", "text/css; charset=utf-8")),
        _ => None,
    }
}
