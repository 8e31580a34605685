//! Scalar UI for OpenAPI documentation

use actix_web::HttpResponse;

const SCALAR_HTML: &str = r#"
<!doctype html>
<html>
  <head>
    <title>Backup Coordinator API Documentation</title>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <style>
      body {
        margin: 0;
      }
    </style>
  </head>
  <body>
    <script
      id="api-reference"
      type="application/json"
      data-configuration='{
        "theme": "default",
        "layout": "modern",
        "spec": {
          "url": "/api-docs/openapi.json"
        }
      }'
    ></script>
    <script src="https://cdn.jsdelivr.net/npm/@scalar/api-reference"></script>
  </body>
</html>
"#;

pub fn scalar_ui() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(SCALAR_HTML)
}
