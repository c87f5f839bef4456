use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use ultron_core::error::GameError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::Conflict(m) | Self::Internal(m) => {
                write!(f, "{m}")
            },
        }
    }
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        let message = e.to_string();
        match e {
            GameError::InvalidPosition { .. } => Self::BadRequest(message),
            GameError::PositionOccupied { .. } | GameError::SessionNotActive { .. } => {
                Self::Conflict(message)
            },
            GameError::SessionNotFound(_) => Self::NotFound(message),
            GameError::PersistenceFailure(_) => Self::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Self::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            Self::Internal(m) => {
                tracing::error!(error = %m, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            },
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use ultron_core::grid::Cell;

    use super::*;

    #[test]
    fn game_errors_map_to_status_codes() {
        let cases = [
            (
                GameError::InvalidPosition {
                    position: Cell::new(-1, 0),
                    reason: "outside the grid",
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GameError::PositionOccupied {
                    position: Cell::new(3, 3),
                    occupant: "obstacle",
                },
                StatusCode::CONFLICT,
            ),
            (GameError::SessionNotFound(9), StatusCode::NOT_FOUND),
            (
                GameError::PersistenceFailure("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
