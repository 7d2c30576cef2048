// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const URL_TRUNCATE_LENGTH: usize = 60;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const COOKIE_ENV_VAR: &str = "KS_COOKIE";
pub const STDIO_PATH: &str = "-";

pub const DEFAULT_URL_FIELD: &str = "URL";
pub const DEFAULT_CDN_FIELD: &str = "CDNURL";
pub const DEFAULT_ERROR_FIELD: &str = "error_msg";
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const REFERER: &str = "https://www.kuaishou.com/";

/// 保留的错误信息: 取消前未完成的记录都会标记为它。
pub const INTERRUPTED_MSG: &str = "interrupted";

pub mod api {
    pub const DEFAULT_ENDPOINTS: &[&str] = &[
        "https://www.kuaishou.com/graphql",
        "https://live.kuaishou.com/m_graphql",
    ];

    pub const VISION_VIDEO_DETAIL_OPERATION: &str = "visionVideoDetail";
    pub const VISION_VIDEO_DETAIL_QUERY: &str = "query visionVideoDetail($photoId: String) {  visionVideoDetail(photoId: $photoId) {    photo {      photoUrl      mainNoWatermarkUrl      mainUrl      videoResource {        h265 { adaptSetRepresentation }        h264 { adaptSetRepresentation }      }      manifest    }  }}";

    /// GraphQL `photo` 对象中优先查找的字段
    pub const URL_FIELD_HINTS: &[&str] = &[
        "photoUrl",
        "mainNoWatermarkUrl",
        "mainUrl",
        "playUrl",
        "srcNoMark",
        "videoUrl",
    ];

    pub const CDN_DOMAIN_HINTS: &[&str] = &["kuaishou", "kwaicdn", "ks-cdn", "ksyuncdn", "gifshow"];

    pub const PHOTO_ID_QUERY_KEYS: &[&str] = &["photoId", "shareObjectId", "videoId", "shortVideoId"];

    pub const LIVE_HOST: &str = "live.kuaishou.com";
    pub const CAPTCHA_HOST: &str = "captcha.zt.kuaishou.com";
}

pub mod errors {
    pub const EMPTY_URL: &str = "empty url";
    pub const NO_HTTP_URL: &str = "no http/https url found";
    pub const PHOTO_ID_NOT_FOUND: &str = "photoId not found";
    pub const CDN_NOT_FOUND: &str = "cdn url not found";
    pub const LIVE_URL: &str = "live.kuaishou.com is not a CDN url";
    pub const CAPTCHA_URL_PREFIX: &str = "captcha url is not a CDN url";
    pub const TRANSFORM_PANICKED: &str = "transform panicked";
}
