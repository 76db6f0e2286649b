use reqwest::Url;

use genera_auth::{Profile, SessionUser};

const INITIALS_SERVICE: &str = "https://ui-avatars.com/api/";
const INITIALS_BACKGROUND: &str = "00365b";
const INITIALS_COLOR: &str = "fdb933";

/// Where a user's avatar image lives.
///
/// Absolute URLs on the profile are used as-is; bare paths are resolved
/// against the public storage bucket; otherwise an initials avatar is built
/// from the email's local part.
pub fn resolve_avatar_url(
    profile: Option<&Profile>,
    user: &SessionUser,
    storage_url: Option<&str>,
    bucket: &str,
) -> String {
    let stored = profile
        .and_then(|p| p.avatar_url.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(avatar) = stored {
        if avatar.starts_with("http://") || avatar.starts_with("https://") {
            return avatar.to_string();
        }
        if let Some(base) = storage_url {
            return format!(
                "{}/storage/v1/object/public/{}/{}",
                base.trim_end_matches('/'),
                bucket,
                avatar.trim_start_matches('/')
            );
        }
    }

    initials_avatar(user.email_local_part().unwrap_or("User"))
}

fn initials_avatar(name: &str) -> String {
    let params = [
        ("name", name),
        ("background", INITIALS_BACKGROUND),
        ("color", INITIALS_COLOR),
        ("size", "128"),
    ];
    match Url::parse_with_params(INITIALS_SERVICE, &params) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{INITIALS_SERVICE}?size=128"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genera_core::UserId;

    fn user(email: Option<&str>) -> SessionUser {
        SessionUser::new(UserId::new(), email.map(str::to_string))
    }

    fn profile_with(avatar: &str) -> Profile {
        let mut p = Profile::new(UserId::new());
        p.avatar_url = Some(avatar.to_string());
        p
    }

    #[test]
    fn absolute_urls_are_kept() {
        let p = profile_with("https://cdn.example.com/a.png");
        assert_eq!(
            resolve_avatar_url(Some(&p), &user(None), Some("https://s.example.com"), "avatars"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn bare_paths_resolve_against_public_bucket() {
        let p = profile_with("/u/1.png");
        assert_eq!(
            resolve_avatar_url(Some(&p), &user(None), Some("https://s.example.com/"), "avatars"),
            "https://s.example.com/storage/v1/object/public/avatars/u/1.png"
        );
    }

    #[test]
    fn missing_avatar_falls_back_to_initials() {
        let url = resolve_avatar_url(None, &user(Some("maria.p@colegio.cl")), None, "avatars");
        assert_eq!(
            url,
            "https://ui-avatars.com/api/?name=maria.p&background=00365b&color=fdb933&size=128"
        );

        let anonymous = resolve_avatar_url(None, &user(None), None, "avatars");
        assert!(anonymous.contains("name=User"));
    }

    #[test]
    fn bare_path_without_storage_falls_back_to_initials() {
        let p = profile_with("u/1.png");
        let url = resolve_avatar_url(Some(&p), &user(Some("ana@x.cl")), None, "avatars");
        assert!(url.starts_with("https://ui-avatars.com/api/?name=ana"));
    }
}
