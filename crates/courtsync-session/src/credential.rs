//! Reading the credential and room out of an upgrade request.

use courtsync_protocol::RoomId;
use courtsync_transport::ConnectRequest;

/// Query parameter carrying the credential when no header is sent.
const TOKEN_PARAM: &str = "token";

/// Extracts the bearer credential.
///
/// An `Authorization: Bearer <credential>` header wins over the `token`
/// query parameter. The scheme is matched case-insensitively; a header
/// with another scheme or an empty credential is ignored. The query value
/// is percent-decoded.
pub fn extract_credential(request: &ConnectRequest) -> Option<String> {
    let from_header = request.authorization.as_deref().and_then(|value| {
        let (scheme, credential) = value.split_once(' ')?;
        let credential = credential.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty())
            .then(|| credential.to_owned())
    });

    from_header.or_else(|| request.query_param(TOKEN_PARAM).filter(|t| !t.is_empty()))
}

/// Reads the room id from a `/ws/{room_id}` (or bare `/{room_id}`) path.
pub fn room_from_path(path: &str) -> Option<RoomId> {
    let trimmed = path.trim_matches('/');
    let room = trimmed.strip_prefix("ws/").unwrap_or(trimmed);
    if room.is_empty() || room == "ws" || room.contains('/') {
        return None;
    }
    Some(RoomId::new(room))
}
