use crate::capture::domain::camera::Camera;
use crate::shared::frame::Frame;

/// Live capture via ffmpeg-next (libavdevice + libavformat + libavcodec).
///
/// `source` is a device path (`/dev/video0`), a stream URL or a video file.
/// When `input_format` is set (e.g. `v4l2`, `avfoundation`, `dshow`) the
/// matching capture device demuxer is used instead of probing.
pub struct FfmpegCamera {
    source: String,
    input_format: Option<String>,
    session: Option<CaptureSession>,
    next_index: usize,
}

// Safety: FfmpegCamera is only used from a single thread at a time (the
// scheduler serialises access behind a mutex). The raw pointers inside
// ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCamera {}

struct CaptureSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
}

impl FfmpegCamera {
    pub fn new(source: impl Into<String>, input_format: Option<String>) -> Self {
        Self {
            source: source.into(),
            input_format,
            session: None,
            next_index: 0,
        }
    }
}

impl Camera for FfmpegCamera {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.session.is_some() {
            return Ok(());
        }
        ffmpeg_next::init()?;

        let ictx = open_input(&self.source, self.input_format.as_deref())?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Camera {} opened: {width}x{height} ({})",
            self.source,
            decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default()
        );

        self.session = Some(CaptureSession {
            ictx,
            decoder,
            scaler,
            width,
            height,
            stream_index,
        });
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.session.is_some()
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(session) = self.session.as_mut() else {
            return Err("FfmpegCamera: not opened".into());
        };
        let frame = session.next_frame(self.next_index)?;
        if frame.is_some() {
            self.next_index += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            log::info!("Camera {} released", self.source);
        }
    }
}

impl CaptureSession {
    /// Pulls packets until one frame decodes. `None` once the source is
    /// exhausted.
    fn next_frame(
        &mut self,
        index: usize,
    ) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if let Some(frame) = self.try_receive(index)? {
            return Ok(Some(frame));
        }
        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                return Ok(None);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder.send_packet(&packet)?;
            if let Some(frame) = self.try_receive(index)? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, index)))
    }
}

fn open_input(
    source: &str,
    input_format: Option<&str>,
) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
    let Some(name) = input_format else {
        return Ok(ffmpeg_next::format::input(&source)?);
    };

    ffmpeg_next::device::register_all();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == name)
        .ok_or_else(|| format!("Capture input format '{name}' is not available"))?;

    let ctx = ffmpeg_next::format::open_with(
        &source,
        &ffmpeg_next::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )?;
    match ctx {
        ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
        _ => Err(format!("{source} did not open as an input").into()),
    }
}

/// Copies RGB24 rows out of a possibly padded ffmpeg frame.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
