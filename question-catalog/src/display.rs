use once_cell::sync::Lazy;
use regex::Regex;

// 句号/分号后跟空白，或连续换行
static BULLET_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.;]\s+|\n+").unwrap());

// youtube.com/watch?v=ID、youtu.be/ID、youtube.com/embed/ID、youtube.com/shorts/ID
static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{6,})",
    )
    .unwrap()
});

/// 把解答拆成要点列表
pub fn solution_bullets(solution: &str) -> Vec<String> {
    BULLET_SPLIT
        .split(solution)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 视频链接转为可嵌入的播放地址，非 YouTube 链接返回 `None`
pub fn video_embed_url(video: &str) -> Option<String> {
    YOUTUBE_ID
        .captures(video.trim())
        .and_then(|caps| caps.get(1))
        .map(|id| format!("https://www.youtube.com/embed/{}", id.as_str()))
}

/// 示例之间用空行分隔
pub fn examples_block(examples: &[String]) -> String {
    examples.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_split_on_sentences_and_lines() {
        let bullets = solution_bullets("Use a hashmap. Store complements; return indices\n\nO(n) time.");
        assert_eq!(bullets, vec!["Use a hashmap", "Store complements", "return indices", "O(n) time."]);
        assert!(solution_bullets("  \n ").is_empty());
    }

    #[test]
    fn decimals_are_not_split() {
        assert_eq!(solution_bullets("Load factor 0.75 works"), vec!["Load factor 0.75 works"]);
    }

    #[test]
    fn youtube_links_become_embeds() {
        let expected = Some("https://www.youtube.com/embed/dQw4w9WgXcQ".to_string());
        assert_eq!(video_embed_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), expected);
        assert_eq!(video_embed_url("https://www.youtube.com/watch?t=10&v=dQw4w9WgXcQ"), expected);
        assert_eq!(video_embed_url("https://youtu.be/dQw4w9WgXcQ?t=3"), expected);
        assert_eq!(video_embed_url("https://vimeo.com/123456"), None);
        assert_eq!(video_embed_url(""), None);
    }

    #[test]
    fn examples_are_separated_by_blank_lines() {
        let examples = vec!["a".to_string(), "b".to_string()];
        assert_eq!(examples_block(&examples), "a\n\nb");
    }
}
