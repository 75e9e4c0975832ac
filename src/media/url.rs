use super::types::MediaError;
use crate::utils::{last_path_segment, split_file_name};
use url::Url;

/// Query parameter the media CDN appends for tracking.
pub const TRACKING_PARAM: &str = "tag";

/// Video assets have no quality selector and are served as-is.
pub const VIDEO_EXTENSION: &str = ".mp4";

/// Suffix that asks the image CDN for the original resolution.
pub const ORIGINAL_QUALITY_SUFFIX: &str = ":orig";

/// Parses `raw` and drops every `tag` query pair, keeping the others in order.
pub fn normalize_url(raw: &str) -> Result<Url, MediaError> {
    let mut url = Url::parse(raw).map_err(|source| MediaError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    if url.query_pairs().any(|(key, _)| key == TRACKING_PARAM) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| *key != TRACKING_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

pub fn normalize(raw: &str) -> Result<String, MediaError> {
    normalize_url(raw).map(String::from)
}

/// Appends `:orig` to image URLs. This is a plain string edit: the CDN does
/// not expose quality through a query parameter.
pub fn upgrade_quality(normalized: &str) -> String {
    let is_video = Url::parse(normalized)
        .map(|url| file_parts(&url).1 == VIDEO_EXTENSION)
        .unwrap_or(false);

    if is_video {
        normalized.to_string()
    } else {
        format!("{normalized}{ORIGINAL_QUALITY_SUFFIX}")
    }
}

/// `(stem, extension)` of the last path segment of `url`.
pub fn file_parts(url: &Url) -> (&str, &str) {
    split_file_name(last_path_segment(url.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_removes_tag_only() {
        assert_eq!(
            normalize("https://pbs.example/img.jpg?tag=x").unwrap(),
            "https://pbs.example/img.jpg"
        );
        assert_eq!(
            normalize("https://pbs.example/img.jpg?format=jpg&tag=12&name=small").unwrap(),
            "https://pbs.example/img.jpg?format=jpg&name=small"
        );
        assert_eq!(
            normalize("https://pbs.example/img.jpg?tag=1&a=1&tag=2&b=2").unwrap(),
            "https://pbs.example/img.jpg?a=1&b=2"
        );
    }

    #[test]
    fn test_normalize_preserves_untagged_urls() {
        assert_eq!(
            normalize("https://pbs.example/media/img.png?b=2&a=1").unwrap(),
            "https://pbs.example/media/img.png?b=2&a=1"
        );
        assert_eq!(
            normalize("https://pbs.example/img.jpg").unwrap(),
            "https://pbs.example/img.jpg"
        );
    }

    #[test]
    fn test_normalize_rejects_invalid_url() {
        let err = normalize("not a url").unwrap_err();
        assert!(matches!(err, MediaError::InvalidUrl { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn test_upgrade_quality() {
        assert_eq!(
            upgrade_quality("https://pbs.example/img.jpg"),
            "https://pbs.example/img.jpg:orig"
        );
        assert_eq!(
            upgrade_quality("https://video.example/vid/720x1280/clip.mp4"),
            "https://video.example/vid/720x1280/clip.mp4"
        );
    }

    #[test]
    fn test_upgrade_after_normalize() {
        let images = [
            "https://pbs.example/a.jpg?tag=1",
            "https://pbs.example/b.png?name=small&tag=2",
            "https://pbs.example/c.webp",
        ];
        for raw in images {
            let source = upgrade_quality(&normalize(raw).unwrap());
            assert!(source.ends_with(":orig"), "{source}");
        }

        let video = normalize("https://video.example/clip.mp4?tag=12").unwrap();
        assert_eq!(upgrade_quality(&video), video);
    }

    #[test]
    fn test_file_parts() {
        let url = Url::parse("https://pbs.example/media/img.jpg?x=1").unwrap();
        assert_eq!(file_parts(&url), ("img", ".jpg"));
        let url = Url::parse("https://pbs.example/").unwrap();
        assert_eq!(file_parts(&url), ("", ""));
    }
}
