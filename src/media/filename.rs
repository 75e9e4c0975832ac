use super::types::MediaDescriptor;
use crate::config::{FilenameSetting, SerialMode};

/// Destination path for `media`: `{directory}/[{account}-]{post_id}-{serial}{ext}`.
///
/// Only builds the string; directory creation and name collisions are left
/// to the download backend.
pub fn make_file_name(media: &MediaDescriptor, setting: &FilenameSetting) -> String {
    let pattern = &setting.filename_pattern;

    let account_part = if pattern.account {
        format!("{}-", media.account_handle)
    } else {
        String::new()
    };

    let serial_part = match pattern.serial {
        SerialMode::Order => format!("{:0>2}", media.display_order()),
        SerialMode::FileName => media.base_name().to_string(),
    };

    format!(
        "{}/{}{}-{}{}",
        setting.directory,
        account_part,
        media.post_id,
        serial_part,
        media.file_extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilenamePattern;
    use crate::media::PostReference;

    fn setting(account: bool, serial: SerialMode) -> FilenameSetting {
        FilenameSetting {
            directory: "dl".to_string(),
            filename_pattern: FilenamePattern { account, serial },
        }
    }

    fn descriptor(url: &str, index: usize) -> MediaDescriptor {
        let post = PostReference::new("alice", "123").unwrap();
        MediaDescriptor::new(&post, url, index).unwrap()
    }

    #[test]
    fn test_order_mode() {
        let media = descriptor("https://pbs.example/img.jpg?tag=x", 0);
        assert_eq!(
            make_file_name(&media, &setting(true, SerialMode::Order)),
            "dl/alice-123-01.jpg"
        );
    }

    #[test]
    fn test_file_name_mode() {
        let media = descriptor("https://pbs.example/img.jpg?tag=x", 0);
        assert_eq!(
            make_file_name(&media, &setting(true, SerialMode::FileName)),
            "dl/alice-123-img.jpg"
        );
    }

    #[test]
    fn test_order_padding() {
        let setting = setting(false, SerialMode::Order);
        for index in 0..9 {
            let media = descriptor("https://pbs.example/img.jpg", index);
            let expected = format!("dl/123-0{}.jpg", index + 1);
            assert_eq!(make_file_name(&media, &setting), expected);
        }

        let media = descriptor("https://pbs.example/img.jpg", 9);
        assert_eq!(make_file_name(&media, &setting), "dl/123-10.jpg");
        let media = descriptor("https://pbs.example/img.jpg", 122);
        assert_eq!(make_file_name(&media, &setting), "dl/123-123.jpg");
    }

    #[test]
    fn test_account_prefix() {
        let media = descriptor("https://pbs.example/media/photo.png", 1);

        for serial in [SerialMode::Order, SerialMode::FileName] {
            let with = make_file_name(&media, &setting(true, serial));
            let basename = with.strip_prefix("dl/").unwrap();
            assert!(basename.starts_with("alice-"), "{with}");

            let without = make_file_name(&media, &setting(false, serial));
            assert!(!without.contains("alice"), "{without}");
        }
    }

    #[test]
    fn test_video_keeps_extension() {
        let media = descriptor("https://video.example/vid/720x1280/clip.mp4?tag=12", 0);
        assert_eq!(
            make_file_name(&media, &setting(false, SerialMode::FileName)),
            "dl/123-clip.mp4"
        );
    }
}
