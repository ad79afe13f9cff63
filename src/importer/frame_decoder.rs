// ==========================================
// 工单系统 - 进度流解码器（客户端侧）
// ==========================================
// 线格式: 每帧 `data: <json>\n\n`
// 规则: 按 "\n\n" 切分，可跨多次 push 拼接；无法解析的帧记日志后跳过
// ==========================================

use crate::domain::import_job::ProgressFrame;
use tracing::warn;

const FRAME_SEPARATOR: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data: ";

/// 编码单帧
pub fn encode_frame(frame: &ProgressFrame) -> serde_json::Result<String> {
    Ok(format!("{}{}\n\n", DATA_PREFIX, serde_json::to_string(frame)?))
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加字节并取出所有完整帧
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProgressFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_separator(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..pos + FRAME_SEPARATOR.len()).collect();
            if let Some(frame) = parse_frame(&raw[..pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// 缓冲区中尚未成帧的字节数
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_SEPARATOR.len())
        .position(|window| window == FRAME_SEPARATOR)
}

fn parse_frame(raw: &[u8]) -> Option<ProgressFrame> {
    let text = String::from_utf8_lossy(raw);
    let payload: String = text
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX).or_else(|| line.strip_prefix("data:")))
        .collect::<Vec<_>>()
        .join("\n");

    if payload.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(&payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, payload = %payload, "无法解析的进度帧，已跳过");
            None
        }
    }
}
