pub mod ffmpeg;
pub mod process;
pub mod storage;
pub mod ytdlp;
