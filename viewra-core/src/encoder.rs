//! C3: Encoder Command Builder.
//!
//! Pure translation from a `TranscodeRequest` to the argv an encoder
//! (ffmpeg) is invoked with. No I/O, no process spawning — every helper
//! here is a plain function over its inputs so it can be unit tested in
//! isolation, the way the teacher's dense pure functions are decomposed
//! one-responsibility-per-helper.

use crate::error::EncoderError;
use crate::models::{Container, Resolution, SpeedPriority, TranscodeRequest};
use std::path::Path;

/// One rung of the adaptive bitrate ladder: a target resolution, the
/// video/audio bitrates to encode it at, and the per-rung codec settings
/// the ABR fan-out writes into the argv alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRung {
    pub resolution: Resolution,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    pub h264_profile: &'static str,
    pub h264_level: &'static str,
    pub crf: u8,
    pub label: String,
}

/// Canonical `(width, height, video_kbps, audio_kbps, label, h264_level)`
/// tuples at the nominal quality (65, scale factor 1.0). Fixed, not
/// configurable — these are the values the ladder scales from.
const LADDER_CANDIDATES: &[(u32, u32, u32, u32, &str, &str)] = &[
    (426, 240, 400, 64, "240p", "3.0"),
    (640, 360, 800, 96, "360p", "3.1"),
    (854, 480, 1400, 128, "480p", "3.1"),
    (1280, 720, 2800, 128, "720p", "4.0"),
    (1920, 1080, 5000, 192, "1080p", "4.2"),
];

const NOMINAL_QUALITY: f64 = 65.0;

/// Build the full ffmpeg argv for `request`, writing output to
/// `output_path`. The first element is never `ffmpeg` itself — callers
/// supply the binary path separately (it comes from configuration, not the
/// request).
pub fn build_argv(
    request: &TranscodeRequest,
    output_path: &Path,
) -> Result<Vec<String>, EncoderError> {
    if request.quality > 100 {
        return Err(EncoderError::QualityOutOfRange(request.quality));
    }
    if let Some(resolution) = request.resolution {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(EncoderError::InvalidResolution {
                width: resolution.width,
                height: resolution.height,
            });
        }
    }

    let has_seek = request.seek_seconds.is_some();
    let segment_duration = segment_duration_for(has_seek);

    let mut args = Vec::new();

    args.push("-y".to_string());
    args.push("-hide_banner".to_string());
    args.push("-loglevel".to_string());
    args.push("warning".to_string());
    args.push("-analyzeduration".to_string());
    args.push("10M".to_string());
    args.push("-probesize".to_string());
    args.push("10M".to_string());

    if let Some(seek) = request.seek_seconds {
        // Fast seek before -i, accurate seek after: skip straight to the
        // keyframe nearest `seek`, then decode forward to the exact frame.
        // Splitting the seek this way avoids a full linear decode from 0.
        let fast_seek = (seek - 2.0).max(0.0);
        args.push("-ss".to_string());
        args.push(format!("{fast_seek:.3}"));
    }

    args.push("-i".to_string());
    args.push(request.input_path.clone());

    if let Some(seek) = request.seek_seconds {
        let fast_seek = (seek - 2.0).max(0.0);
        let remainder = seek - fast_seek;
        args.push("-ss".to_string());
        args.push(format!("{remainder:.3}"));
    }

    args.push("-map".to_string());
    args.push("0:v:0".to_string());
    args.push("-map".to_string());
    args.push("0:a:0?".to_string());
    args.push("-fps_mode".to_string());
    args.push("passthrough".to_string());
    args.push("-max_muxing_queue_size".to_string());
    args.push("4096".to_string());
    args.push("-threads".to_string());
    args.push(WORKER_THREADS.to_string());

    args.extend(video_args(request)?);
    args.extend(audio_filters(request));
    args.extend(keyframe_params(has_seek, request.enable_abr));

    if request.enable_abr && request.container.is_segmented() {
        let source = request
            .resolution
            .unwrap_or(Resolution { width: 1920, height: 1080 });
        let ladder = abr_ladder(source.width, source.height, request.quality);
        args.extend(abr_map_args(&ladder, request.container));
    } else {
        args.push("-vf".to_string());
        args.push(video_filter_chain(request.resolution));
    }

    args.extend(muxer_args(request.container, output_path, segment_duration, has_seek)?);

    validate_argv(&args)?;
    Ok(args)
}

/// Worker threads capped so one session can't starve the others sharing
/// this host (spec.md §4.3 step 11).
const WORKER_THREADS: u32 = 4;

/// `segment_duration = 2s` for seek-ahead sessions, `4s` otherwise
/// (spec.md §4.3 step 6), shared between keyframe alignment and the muxer.
#[must_use]
pub fn segment_duration_for(has_seek: bool) -> f64 {
    if has_seek {
        2.0
    } else {
        4.0
    }
}

fn video_args(request: &TranscodeRequest) -> Result<Vec<String>, EncoderError> {
    let codec = encoder_name(&request.video_codec, request.prefer_hardware, request.hardware_type.as_deref())?;
    let mut args = vec!["-c:v".to_string(), codec];

    if request.prefer_hardware {
        // Hardware encoders take a target bitrate, not a CRF.
        args.push("-b:v".to_string());
        args.push(format!("{}k", hardware_bitrate_kbps(request.quality)));
        return Ok(args);
    }

    match request.video_codec.to_ascii_lowercase().as_str() {
        "vp9" => {
            args.push("-crf".to_string());
            args.push(crf_for(request.quality).to_string());
            args.push("-b:v".to_string());
            args.push("0".to_string());
            args.push("-cpu-used".to_string());
            args.push("2".to_string());
        }
        "h264" | "hevc" | "h265" => {
            args.push("-preset".to_string());
            args.push(preset_for(request.speed_priority).to_string());
            args.push("-crf".to_string());
            args.push(crf_for(request.quality).to_string());
            args.push("-profile:v".to_string());
            args.push(h264_profile_for(request.quality).to_string());
            args.push("-level".to_string());
            args.push(h264_level_for(request.resolution).to_string());
        }
        _ => {
            args.push("-crf".to_string());
            args.push(crf_for(request.quality).to_string());
        }
    }

    Ok(args)
}

fn encoder_name(
    video_codec: &str,
    prefer_hardware: bool,
    hardware_type: Option<&str>,
) -> Result<String, EncoderError> {
    let codec = video_codec.to_ascii_lowercase();
    if prefer_hardware {
        let hw = hardware_type.unwrap_or("vaapi");
        return Ok(match (codec.as_str(), hw) {
            ("h264", "vaapi") => "h264_vaapi".to_string(),
            ("h264", "nvenc") => "h264_nvenc".to_string(),
            ("h264", "videotoolbox") => "h264_videotoolbox".to_string(),
            ("hevc", "vaapi") => "hevc_vaapi".to_string(),
            ("hevc", "nvenc") => "hevc_nvenc".to_string(),
            ("hevc", "videotoolbox") => "hevc_videotoolbox".to_string(),
            (other, _) => {
                return Err(EncoderError::UnsupportedCodec {
                    codec: other.to_string(),
                    container: hw.to_string(),
                })
            }
        });
    }

    Ok(match codec.as_str() {
        "h264" => "libx264".to_string(),
        "hevc" | "h265" => "libx265".to_string(),
        "vp9" => "libvpx-vp9".to_string(),
        "av1" => "libaom-av1".to_string(),
        other => {
            return Err(EncoderError::UnsupportedCodec {
                codec: other.to_string(),
                container: "software".to_string(),
            })
        }
    })
}

/// x264/x265-style preset for the requested speed/quality trade-off
/// (spec.md §4.3 step 4).
#[must_use]
pub fn preset_for(speed_priority: SpeedPriority) -> &'static str {
    match speed_priority {
        SpeedPriority::Fastest => "fast",
        SpeedPriority::Balanced => "medium",
        SpeedPriority::Quality => "slower",
    }
}

/// Map the 0-100 quality scale onto x264/x265's CRF knob:
/// `CRF = 28 − quality·12/100`, clamped to `[16,28]` (spec.md §4.3 step 5).
/// Lower CRF is higher quality, so higher `quality` means a lower CRF.
#[must_use]
pub fn crf_for(quality: u8) -> u8 {
    let quality = f64::from(quality.min(100));
    let crf = 28.0 - (quality * 12.0 / 100.0);
    crf.clamp(16.0, 28.0).round() as u8
}

/// H.264 profile for the requested quality: baseline below 30, high at or
/// above it (spec.md §4.3 step 5).
#[must_use]
pub fn h264_profile_for(quality: u8) -> &'static str {
    if quality < 30 {
        "baseline"
    } else {
        "high"
    }
}

/// H.264 level for the target resolution, falling back to a 1080p-ish
/// default when no explicit resolution was requested.
#[must_use]
pub fn h264_level_for(resolution: Option<Resolution>) -> &'static str {
    let height = resolution.map_or(1080, |r| r.height);
    match height {
        0..=240 => "3.0",
        241..=480 => "3.1",
        481..=720 => "4.0",
        _ => "4.2",
    }
}

/// Approximate constant bitrate for hardware encoders, which don't expose
/// a CRF-like quality knob the same way software encoders do.
fn hardware_bitrate_kbps(quality: u8) -> u32 {
    let quality = f64::from(quality.min(100));
    (800.0 + (quality / 100.0) * 7200.0).round() as u32
}

/// GOP / keyframe interval flags. A seek-ahead session needs a keyframe at
/// (or very near) its seek point so the handoff is glitch-free; ABR
/// sessions need GOP-aligned segments across every rung so a client can
/// switch rungs at a segment boundary (spec.md §4.3 step 6).
#[must_use]
pub fn keyframe_params(has_seek: bool, enable_abr: bool) -> Vec<String> {
    if !(enable_abr || has_seek) {
        return Vec::new();
    }

    let segment_duration = segment_duration_for(has_seek);
    let gop = (segment_duration * 30.0).round() as u32;
    let min_gop = (segment_duration * 24.0).round() as u32;

    vec![
        "-g".to_string(),
        gop.to_string(),
        "-keyint_min".to_string(),
        min_gop.to_string(),
        // Scene-change keyframes would shift segment boundaries out of
        // alignment across ABR rungs, so they're disabled entirely.
        "-sc_threshold".to_string(),
        "0".to_string(),
        "-bf".to_string(),
        "3".to_string(),
        "-flags".to_string(),
        "+cgop".to_string(),
        "-force_key_frames".to_string(),
        format!("expr:gte(t,n_forced*{segment_duration})"),
    ]
}

/// Scale/deinterlace/pixel-format filter chain for the non-ABR path
/// (spec.md §4.3 step 7). ABR's per-rung `filter_complex` carries the
/// equivalent tail inline instead of a standalone `-vf`.
fn video_filter_chain(resolution: Option<Resolution>) -> String {
    let mut stages = Vec::new();
    if let Some(resolution) = resolution {
        stages.push(format!(
            "scale={}:{}:flags=lanczos",
            resolution.width, resolution.height
        ));
    }
    stages.push("yadif".to_string());
    stages.push("format=yuv420p".to_string());
    stages.join(",")
}

/// Audio transcode flags. Fixed to AAC/Opus depending on container — the
/// request's `audio_codec` is advisory for direct-play decisions upstream,
/// not something C3 blindly forwards, since ffmpeg's encoder name and the
/// request's codec label aren't always the same string (spec.md §4.3
/// step 8).
#[must_use]
pub fn audio_filters(request: &TranscodeRequest) -> Vec<String> {
    let mut args = vec!["-c:a".to_string()];
    match request.container {
        Container::WebM => {
            args.push("libopus".to_string());
            args.push("-b:a".to_string());
            args.push("192k".to_string());
        }
        _ => {
            args.push("aac".to_string());
            args.push("-profile:a".to_string());
            args.push("aac_low".to_string());
            args.push("-b:a".to_string());
            args.push("192k".to_string());
        }
    }
    args.push("-ar".to_string());
    args.push("48000".to_string());
    // Async resampling absorbs drifting source timestamps instead of
    // letting them accumulate into audible pops; cfr sync keeps the frame
    // rate constant through that correction.
    args.push("-af".to_string());
    args.push("aresample=async=1:first_pts=0".to_string());
    args.push("-async".to_string());
    args.push("1".to_string());
    // Explicit 5.1 -> stereo downmix matrix rather than a bare `-ac 2`,
    // which leaves the channel weighting up to ffmpeg's defaults.
    args.push("-ac".to_string());
    args.push("2".to_string());
    args.push("-af".to_string());
    args.push(
        "pan=stereo|FL=0.5*FC+0.707*FL+0.707*BL|FR=0.5*FC+0.707*FR+0.707*BR".to_string(),
    );
    args
}

/// Build the adaptive bitrate ladder for a source of `source_w`x`source_h`,
/// scaled from the canonical bitrate pairs by `quality` relative to the
/// nominal quality of 65. Rungs above the source resolution are dropped —
/// upscaling never improves perceived quality and only wastes bandwidth.
/// Always returns at least one rung: when the source is smaller than the
/// lowest candidate, a single 240p rung is synthesized rather than
/// returning an empty ladder (spec.md §4.3 step 9).
#[must_use]
pub fn abr_ladder(source_w: u32, source_h: u32, quality: u8) -> Vec<LadderRung> {
    let scale = (f64::from(quality) / NOMINAL_QUALITY).clamp(0.4, 1.6);
    let crf = crf_for(quality);
    let profile = h264_profile_for(quality);

    let to_rung = |(w, h, v_kbps, a_kbps, label, level): (u32, u32, u32, u32, &str, &str)| LadderRung {
        resolution: Resolution { width: w, height: h },
        video_kbps: (f64::from(v_kbps) * scale).round() as u32,
        audio_kbps: a_kbps,
        h264_profile: profile,
        h264_level: level,
        crf,
        label: label.to_string(),
    };

    let mut rungs: Vec<LadderRung> = LADDER_CANDIDATES
        .iter()
        .copied()
        .filter(|(w, h, ..)| *w <= source_w && *h <= source_h)
        .map(to_rung)
        .collect();

    if rungs.is_empty() {
        rungs.push(to_rung(LADDER_CANDIDATES[0]));
    }

    rungs
}

/// `-map`/`-filter_complex` style fan-out for each ABR rung, plus an
/// `adaptation_sets` descriptor grouping every video rung under one id and
/// the shared audio under another (spec.md §4.3 step 9; DASH-only, since
/// HLS/MP4 don't have an equivalent muxer concept).
#[must_use]
pub fn abr_map_args(ladder: &[LadderRung], container: Container) -> Vec<String> {
    if ladder.is_empty() {
        return Vec::new();
    }

    let splits: Vec<String> = (0..ladder.len()).map(|i| format!("[v{i}]")).collect();
    let mut filter = format!("[0:v]split={}{}", ladder.len(), splits.join(""));
    for (i, rung) in ladder.iter().enumerate() {
        filter.push_str(&format!(
            ";[v{i}]scale={}:{}:flags=lanczos,yadif,format=yuv420p[v{i}out]",
            rung.resolution.width, rung.resolution.height
        ));
    }

    let mut args = vec!["-filter_complex".to_string(), filter];
    for (i, rung) in ladder.iter().enumerate() {
        args.push("-map".to_string());
        args.push(format!("[v{i}out]"));
        args.push("-map".to_string());
        args.push("0:a:0?".to_string());
        args.push(format!("-b:v:{i}"));
        args.push(format!("{}k", rung.video_kbps));
        args.push(format!("-b:a:{i}"));
        args.push(format!("{}k", rung.audio_kbps));
        args.push(format!("-profile:v:{i}"));
        args.push(rung.h264_profile.to_string());
        args.push(format!("-level:{i}"));
        args.push(rung.h264_level.to_string());
        args.push(format!("-crf:{i}"));
        args.push(rung.crf.to_string());
    }

    if container == Container::Dash {
        let video_ids: Vec<String> = (0..ladder.len()).map(|i| i.to_string()).collect();
        let audio_id = ladder.len().to_string();
        args.push("-adaptation_sets".to_string());
        args.push(format!(
            "id=0,streams={} id=1,streams={audio_id}",
            video_ids.join(",")
        ));
    }

    args
}

/// Muxer-specific flags: DASH/HLS segmenting, or a single MP4/WebM/MKV
/// output file. `segment_duration` comes from [`segment_duration_for`] so
/// the muxer's segment length always matches the keyframe interval
/// (spec.md §4.3 step 10, P6).
pub fn muxer_args(
    container: Container,
    output_path: &Path,
    segment_duration: f64,
    has_seek: bool,
) -> Result<Vec<String>, EncoderError> {
    let output = output_path.to_string_lossy().to_string();
    Ok(match container {
        Container::Mp4 => vec![
            "-movflags".to_string(),
            "+faststart+frag_keyframe+empty_moov+dash+cmaf".to_string(),
            "-frag_duration".to_string(),
            "1000000".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            output,
        ],
        Container::WebM => vec!["-f".to_string(), "webm".to_string(), output],
        Container::Mkv => vec!["-f".to_string(), "matroska".to_string(), output],
        Container::Dash => vec![
            "-f".to_string(),
            "dash".to_string(),
            "-seg_duration".to_string(),
            format!("{segment_duration}"),
            "-frag_duration".to_string(),
            "1".to_string(),
            "-use_template".to_string(),
            "1".to_string(),
            "-use_timeline".to_string(),
            "1".to_string(),
            "-streaming".to_string(),
            "1".to_string(),
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            "-copyts".to_string(),
            "-global_sidx".to_string(),
            "1".to_string(),
            "-write_prft".to_string(),
            "1".to_string(),
            "-init_seg_name".to_string(),
            "init-$RepresentationID$.m4s".to_string(),
            "-media_seg_name".to_string(),
            "chunk-$RepresentationID$-$Number$.m4s".to_string(),
            output,
        ],
        Container::Hls => {
            let mut args = vec![
                "-f".to_string(),
                "hls".to_string(),
                "-hls_time".to_string(),
                format!("{segment_duration}"),
                "-hls_playlist_type".to_string(),
                "vod".to_string(),
                "-hls_segment_type".to_string(),
                "fmp4".to_string(),
                "-hls_fmp4_init_filename".to_string(),
                "init.mp4".to_string(),
                "-hls_part_time".to_string(),
                "0.5".to_string(),
                "-hls_flags".to_string(),
                "independent_segments".to_string(),
                "-hls_segment_filename".to_string(),
                output_path
                    .with_extension("")
                    .join("segment_%05d.m4s")
                    .to_string_lossy()
                    .to_string(),
            ];
            if has_seek {
                args.push("-master_pl_name".to_string());
                args.push("master.m3u8".to_string());
            }
            args.push(output);
            args
        }
    })
}

/// Sanity checks over the finished argv: exactly one `-i` with a non-empty
/// value, `-f` not specified twice (which would silently pick ffmpeg's
/// last occurrence and hide a bug in the builder above), and a non-empty
/// trailing output path.
fn validate_argv(args: &[String]) -> Result<(), EncoderError> {
    let input_positions: Vec<usize> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| a.as_str() == "-i")
        .map(|(i, _)| i)
        .collect();

    match input_positions.as_slice() {
        [pos] => {
            if args.get(pos + 1).is_none_or(|v| v.trim().is_empty()) {
                return Err(EncoderError::MalformedArgv(
                    "-i is missing its input path".to_string(),
                ));
            }
        }
        _ => {
            return Err(EncoderError::MalformedArgv(
                "expected exactly one -i".to_string(),
            ))
        }
    }

    if args.iter().filter(|a| a.as_str() == "-f").count() > 1 {
        return Err(EncoderError::MalformedArgv("duplicate -f".to_string()));
    }

    match args.last() {
        Some(output) if !output.trim().is_empty() => {}
        _ => {
            return Err(EncoderError::MalformedArgv(
                "missing output path".to_string(),
            ))
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn sample_request() -> TranscodeRequest {
        TranscodeRequest {
            input_path: "/media/movie.mkv".to_string(),
            session_id: Uuid::new_v4(),
            container: Container::Mp4,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            quality: 65,
            speed_priority: SpeedPriority::Balanced,
            resolution: None,
            seek_seconds: None,
            enable_abr: false,
            prefer_hardware: false,
            hardware_type: None,
        }
    }

    #[test]
    fn builds_argv_with_single_input_and_output() {
        let request = sample_request();
        let argv = build_argv(&request, Path::new("/out/session/output.mp4")).unwrap();
        assert_eq!(argv.iter().filter(|a| a.as_str() == "-i").count(), 1);
        assert!(argv.contains(&"/media/movie.mkv".to_string()));
        assert!(argv.last().unwrap().ends_with("output.mp4"));
    }

    #[test]
    fn quality_out_of_range_rejected() {
        let mut request = sample_request();
        request.quality = 101;
        assert!(matches!(
            build_argv(&request, Path::new("/out.mp4")),
            Err(EncoderError::QualityOutOfRange(101))
        ));
    }

    #[test]
    fn unsupported_codec_rejected() {
        let mut request = sample_request();
        request.video_codec = "theora".to_string();
        assert!(build_argv(&request, Path::new("/out.mp4")).is_err());
    }

    #[test]
    fn threads_are_capped() {
        let request = sample_request();
        let argv = build_argv(&request, Path::new("/out.mp4")).unwrap();
        let pos = argv.iter().position(|a| a == "-threads").unwrap();
        assert_eq!(argv[pos + 1], "4");
    }

    #[test]
    fn crf_decreases_as_quality_increases() {
        assert!(crf_for(10) > crf_for(90));
    }

    #[test]
    fn crf_is_clamped_to_spec_range() {
        assert_eq!(crf_for(0), 28);
        assert_eq!(crf_for(100), 16);
    }

    #[test]
    fn preset_matches_speed_priority() {
        assert_eq!(preset_for(SpeedPriority::Fastest), "fast");
        assert_eq!(preset_for(SpeedPriority::Balanced), "medium");
        assert_eq!(preset_for(SpeedPriority::Quality), "slower");
    }

    #[test]
    fn profile_switches_at_quality_30() {
        assert_eq!(h264_profile_for(29), "baseline");
        assert_eq!(h264_profile_for(30), "high");
    }

    #[test]
    fn abr_ladder_at_nominal_quality_matches_canonical_pairs() {
        let ladder = abr_ladder(1920, 1080, 65);
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder[0].video_kbps, 400);
        assert_eq!(ladder[4].video_kbps, 5000);
        assert_eq!(ladder[0].label, "240p");
    }

    #[test]
    fn abr_ladder_drops_rungs_above_source_resolution() {
        let ladder = abr_ladder(854, 480, 65);
        assert_eq!(ladder.len(), 3);
        assert!(ladder.iter().all(|r| r.resolution.width <= 854));
    }

    #[test]
    fn abr_ladder_scales_bitrate_with_quality() {
        let low = abr_ladder(1920, 1080, 33);
        let high = abr_ladder(1920, 1080, 97);
        assert!(low[0].video_kbps < high[0].video_kbps);
    }

    #[test]
    fn abr_ladder_never_empty_for_tiny_source() {
        let ladder = abr_ladder(160, 90, 65);
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder[0].label, "240p");
    }

    #[test]
    fn keyframe_params_empty_without_abr_or_seek() {
        assert!(keyframe_params(false, false).is_empty());
        assert!(!keyframe_params(true, false).is_empty());
        assert!(!keyframe_params(false, true).is_empty());
    }

    #[test]
    fn keyframe_params_use_2s_gop_on_seek_and_4s_otherwise() {
        let seek_args = keyframe_params(true, false);
        let gop_pos = seek_args.iter().position(|a| a == "-g").unwrap();
        assert_eq!(seek_args[gop_pos + 1], "60");

        let abr_args = keyframe_params(false, true);
        let gop_pos = abr_args.iter().position(|a| a == "-g").unwrap();
        assert_eq!(abr_args[gop_pos + 1], "120");
    }

    #[test]
    fn audio_filters_use_192kbps_and_48khz() {
        let request = sample_request();
        let args = audio_filters(&request);
        let rate_pos = args.iter().position(|a| a == "-ar").unwrap();
        assert_eq!(args[rate_pos + 1], "48000");
        let bitrate_pos = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[bitrate_pos + 1], "192k");
    }

    #[test]
    fn dash_muxer_args_set_segment_duration_and_templated_names() {
        let args = muxer_args(Container::Dash, Path::new("/out/manifest.mpd"), 4.0, false).unwrap();
        let pos = args.iter().position(|a| a == "-seg_duration").unwrap();
        assert_eq!(args[pos + 1], "4");
        assert!(args.contains(&"init-$RepresentationID$.m4s".to_string()));
    }

    #[test]
    fn hls_muxer_args_use_fmp4_segments() {
        let args = muxer_args(Container::Hls, Path::new("/out/playlist.m3u8"), 2.0, true).unwrap();
        assert!(args.contains(&"fmp4".to_string()));
        assert!(args.iter().any(|a| a.ends_with(".m4s")));
        assert!(args.contains(&"master.m3u8".to_string()));
    }

    #[test]
    fn mp4_muxer_args_set_fragmented_movflags() {
        let args = muxer_args(Container::Mp4, Path::new("/out/output.mp4"), 4.0, false).unwrap();
        let pos = args.iter().position(|a| a == "-movflags").unwrap();
        assert!(args[pos + 1].contains("frag_keyframe"));
        assert!(args[pos + 1].contains("cmaf"));
    }

    #[test]
    fn seek_adds_two_ss_flags() {
        let mut request = sample_request();
        request.seek_seconds = Some(120.0);
        let argv = build_argv(&request, Path::new("/out.mp4")).unwrap();
        assert_eq!(argv.iter().filter(|a| a.as_str() == "-ss").count(), 2);
    }

    #[test]
    fn abr_with_segmented_container_emits_filter_complex_and_adaptation_sets() {
        let mut request = sample_request();
        request.container = Container::Dash;
        request.enable_abr = true;
        request.resolution = Some(Resolution { width: 1920, height: 1080 });
        let argv = build_argv(&request, Path::new("/out/manifest.mpd")).unwrap();
        assert!(argv.contains(&"-filter_complex".to_string()));
        assert!(argv.contains(&"-adaptation_sets".to_string()));
    }
}
