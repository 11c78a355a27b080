use std::env::{self, VarError};

use anyhow::{anyhow, bail};
use image::ImageBuffer;
use once_cell::sync::Lazy;

use super::Image;

/// JPEG decoders that frames coming from MJPG webcams can be routed through.
#[derive(Debug)]
enum JpegBackend {
    /// Uses the `zune-jpeg` crate, a fast pure-Rust decoder.
    ZuneJpeg,
    /// Uses the `image` crate's built-in decoder (`jpeg-decoder`). Slower, but very robust.
    JpegDecoder,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::ZuneJpeg;

const ENV_VAR_JPEG_BACKEND: &str = "FINGERSPAN_JPEG_BACKEND";

static JPEG_BACKEND: Lazy<JpegBackend> = Lazy::new(|| {
    let backend = match env::var(ENV_VAR_JPEG_BACKEND) {
        Ok(v) if v == "zune-jpeg" => JpegBackend::ZuneJpeg,
        Ok(v) if v == "jpeg-decoder" => JpegBackend::JpegDecoder,
        Ok(v) => {
            log::warn!(
                "invalid value '{v}' for `{ENV_VAR_JPEG_BACKEND}`, using {:?}",
                DEFAULT_BACKEND
            );
            DEFAULT_BACKEND
        }
        Err(VarError::NotPresent) => DEFAULT_BACKEND,
        Err(VarError::NotUnicode(s)) => {
            log::warn!(
                "invalid value {} for `{ENV_VAR_JPEG_BACKEND}`, using {:?}",
                s.to_string_lossy(),
                DEFAULT_BACKEND
            );
            DEFAULT_BACKEND
        }
    };
    log::debug!("using JPEG decode backend: {:?}", backend);
    backend
});

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = match *JPEG_BACKEND {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp.decode_headers()?;
            let colorspace = decomp
                .get_output_colorspace()
                .ok_or_else(|| anyhow!("JPEG headers contain no colorspace"))?;
            if colorspace != ColorSpace::RGBA {
                bail!("unsupported colorspace {colorspace:?} (expected RGBA)");
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| anyhow!("JPEG headers contain no image size"))?;
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow!("JPEG headers contain no image size"))?;
            ImageBuffer::from_raw(width.into(), height.into(), buf)
                .ok_or_else(|| anyhow!("decoded JPEG has an inconsistent buffer size"))?
        }
    };

    Ok(Image { buf })
}
