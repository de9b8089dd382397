use std::time::Duration;

/// ICAO passport photo target size: 35mm x 45mm at 600 DPI.
pub const ICAO_WIDTH_PX: u32 = 827;
pub const ICAO_HEIGHT_PX: u32 = 1063;

/// Margin added on each side of a detected face before cropping.
pub const CROP_MARGIN_PX: i32 = 50;

/// Smallest face the cascade reports, in frame pixels.
pub const DETECT_MIN_FACE_PX: u32 = 150;

/// Scale step between successive cascade scan levels.
pub const DETECT_SCALE_STEP: f32 = 1.1;

/// Sliding-window step of the cascade scan, in pixels.
pub const DETECT_SLIDE_STEP_PX: u32 = 4;

/// Cascade acceptance score; the engine's analog of a neighbor-vote cut.
pub const DETECT_SCORE_THRESH: f64 = 2.0;

/// Length of each liveliness phase. Two phases must pass back to back.
pub const LIVELINESS_PHASE: Duration = Duration::from_secs(5);

/// First available camera.
pub const DEFAULT_CAMERA_INDEX: u32 = 0;

pub const SEETA_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const SEETA_MODEL_URL: &str =
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin";

pub const REMOVE_BG_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";
pub const REMOVE_BG_ACCOUNT_ENDPOINT: &str = "https://api.remove.bg/v1.0/account";
pub const REMOVE_BG_API_KEY_HEADER: &str = "X-Api-Key";

/// Size mode passed to the background-removal service.
pub const REMOVE_BG_SIZE_MODE: &str = "auto";

/// Client-side deadline for the background-removal call.
pub const REMOVE_BG_TIMEOUT: Duration = Duration::from_secs(30);
