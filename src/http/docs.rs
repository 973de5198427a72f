//! OpenAPI description and Swagger UI page for the authenticated variant.

use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <title>API de usuarios</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

pub async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI)
}

pub async fn openapi() -> Response {
    Json(document()).into_response()
}

fn message(description: &str) -> Value {
    let schema = json!({ "$ref": "#/components/schemas/Mensaje" });
    json!({ "description": description, "content": json_content(schema) })
}

fn user_body(required: &[&str]) -> Value {
    let schema = json!({
        "type": "object",
        "required": required,
        "properties": {
            "nombre": { "type": "string" },
            "email": { "type": "string", "format": "email" }
        }
    });
    json!({ "required": true, "content": json_content(schema) })
}

fn object(properties: Value) -> Value {
    json!({ "type": "object", "properties": properties })
}

fn json_content(schema: Value) -> Value {
    json!({ "application/json": { "schema": schema } })
}

fn login_path() -> Value {
    let body = json!({
        "type": "object",
        "required": ["email"],
        "properties": { "email": { "type": "string" } }
    });
    let token = object(json!({ "token": { "type": "string" } }));
    json!({
        "post": {
            "summary": "Obtener un token",
            "security": [],
            "requestBody": { "required": true, "content": json_content(body) },
            "responses": {
                "200": { "description": "Token emitido", "content": json_content(token) },
                "400": message("Falta el email"),
                "401": message("Email desconocido")
            }
        }
    })
}

fn collection_path() -> Value {
    let list = json!({ "type": "array", "items": { "$ref": "#/components/schemas/Usuario" } });
    json!({
        "get": {
            "summary": "Listar usuarios",
            "responses": {
                "200": { "description": "Todos los usuarios", "content": json_content(list) },
                "401": message("Token ausente o inválido")
            }
        },
        "post": {
            "summary": "Agregar un usuario",
            "requestBody": user_body(&["nombre", "email"]),
            "responses": {
                "201": message("Usuario agregado"),
                "400": message("Cuerpo inválido"),
                "409": message("Nombre o email duplicado")
            }
        }
    })
}

fn item_path() -> Value {
    let id_param = json!([{
        "name": "id", "in": "path", "required": true,
        "schema": { "type": "integer", "format": "int64", "minimum": 0 }
    }]);
    let user = json!({ "$ref": "#/components/schemas/Usuario" });
    let update = json!({
        "summary": "Actualizar un usuario",
        "parameters": id_param,
        "requestBody": user_body(&[]),
        "responses": {
            "200": message("Usuario actualizado"),
            "400": message("Cuerpo inválido"),
            "404": message("Usuario no encontrado"),
            "409": message("Nombre o email duplicado")
        }
    });
    json!({
        "get": {
            "summary": "Obtener un usuario",
            "parameters": id_param,
            "responses": {
                "200": { "description": "El usuario", "content": json_content(user) },
                "404": message("Usuario no encontrado")
            }
        },
        "put": update,
        "patch": update,
        "delete": {
            "summary": "Eliminar un usuario",
            "parameters": id_param,
            "responses": {
                "200": message("Usuario eliminado"),
                "404": message("Usuario no encontrado")
            }
        }
    })
}

pub fn document() -> Value {
    let usuario = object(json!({
        "id": { "type": "integer", "format": "int64" },
        "nombre": { "type": "string" },
        "email": { "type": "string" }
    }));
    let mensaje = object(json!({ "mensaje": { "type": "string" } }));

    json!({
        "openapi": "3.0.3",
        "info": { "title": "API de usuarios", "version": env!("CARGO_PKG_VERSION") },
        "security": [{ "bearer": [] }],
        "paths": {
            "/login": login_path(),
            "/usuarios": collection_path(),
            "/usuarios/{id}": item_path()
        },
        "components": {
            "securitySchemes": {
                "bearer": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            },
            "schemas": { "Usuario": usuario, "Mensaje": mensaje }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::document;

    #[test]
    fn document_lists_every_route() {
        let doc = document();
        let paths = doc["paths"].as_object().expect("paths");
        assert!(paths.contains_key("/login"));
        assert!(paths.contains_key("/usuarios"));
        let item = &paths["/usuarios/{id}"];
        for method in ["get", "put", "patch", "delete"] {
            assert!(item.get(method).is_some(), "{method}");
        }
    }
}
