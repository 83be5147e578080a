pub mod cut;
pub mod probe;
pub mod process;
pub mod sniff;

pub use cut::{cut_args, format_timestamp, Cutter, FfmpegCutter, FFMPEG};
pub use probe::{FfprobeProber, Prober, FFPROBE};
pub use process::{ProcessOutput, ProcessRunner, SystemRunner};
pub use sniff::{detect_mime, is_video, sniff_mime, OCTET_STREAM, SNIFF_LEN};
