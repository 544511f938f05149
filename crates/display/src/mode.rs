//! Parsing and formatting of Rockchip HDMI mode strings.
//!
//! The HDMI driver lists modes as `<w>x<h><p|i>-<refresh>`, e.g.
//! `1920x1080p-60`, sometimes with a marker prefix (`* `) for the active
//! mode or a colour-format suffix (`(YCbCr420)`). The `3dmode` node holds
//! one `<mode>,<bitmask>` line per 3D-capable mode plus `cur3dmode=<n>`.

use rk_common::{Display3dMode, ResolutionInfo};

/// Subtitle baseline as a fraction of the screen height.
const SUBTITLE_LINE: f32 = 0.965;

/// Parse one mode string. Returns `None` for anything that is not a mode.
pub fn sys_mode_to_resolution(mode: &str) -> Option<ResolutionInfo> {
    let first = mode.chars().next()?;
    let body: String = if first.is_ascii_digit() {
        mode.to_string()
    } else {
        mode.chars().skip(2).collect()
    };
    let body = body.trim();

    let (width, height, interlaced, refresh) = (0..body.len())
        .filter(|&i| body.is_char_boundary(i))
        .find_map(|i| parse_mode_at(&body[i..]))?;
    if width == 0 || height == 0 {
        return None;
    }

    let refresh_rate = refresh as f32;
    Some(ResolutionInfo {
        width,
        height,
        screen_width: width,
        screen_height: height,
        refresh_rate,
        interlaced,
        mode_3d: None,
        subtitle_line: subtitle_line(height),
        label: format!(
            "{width}x{height} @ {refresh_rate:.2}{} - Full Screen",
            if interlaced { "i" } else { "" }
        ),
        id: mode.to_string(),
    })
}

/// `<w>x<h><p|i>-<r>` at the start of `s`; trailing text is ignored.
fn parse_mode_at(s: &str) -> Option<(u32, u32, bool, u32)> {
    let (width, rest) = take_number(s)?;
    let rest = rest.strip_prefix('x')?;
    let (height, rest) = take_number(rest)?;
    let (interlaced, rest) = match rest.as_bytes().first()? {
        b'p' => (false, &rest[1..]),
        b'i' => (true, &rest[1..]),
        _ => return None,
    };
    let rest = rest.strip_prefix('-')?;
    let (refresh, _) = take_number(rest)?;
    Some((width, height, interlaced, refresh))
}

fn take_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

pub(crate) fn subtitle_line(height: u32) -> u32 {
    (SUBTITLE_LINE * height as f32) as u32
}

/// One line of the `3dmode` node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability3d {
    pub mode: String,
    pub bits: u32,
}

impl Capability3d {
    /// 3D structures advertised by this line, in probe order.
    pub fn modes(&self) -> Vec<Display3dMode> {
        [
            Display3dMode::FramePacking,
            Display3dMode::SideBySide,
            Display3dMode::TopBottom,
        ]
        .into_iter()
        .filter(|m| self.bits & m.capability_bit() != 0)
        .collect()
    }

    /// Whether this line describes `mode` (case-insensitive prefix match).
    pub fn applies_to(&self, mode: &str) -> bool {
        let mode = mode.trim();
        !mode.is_empty()
            && self
                .mode
                .get(..mode.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(mode))
    }
}

/// Parse the capability lines of the `3dmode` node. Lines that are not
/// `<mode>,<integer>` are skipped.
pub fn parse_3d_capabilities(text: &str) -> Vec<Capability3d> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.trim().split(',');
            let mode = parts.next()?.trim();
            let bits = parts.next()?.trim().parse().ok()?;
            if parts.next().is_some() || mode.is_empty() {
                return None;
            }
            Some(Capability3d {
                mode: mode.to_string(),
                bits,
            })
        })
        .collect()
}

/// Value of `cur3dmode=<n>`, or `-1` when absent.
pub fn parse_current_3d_mode(text: &str) -> i32 {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("cur3dmode="))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(-1)
}

/// The HDMI mode string used for a requested output resolution.
///
/// Unknown refresh rates fall back to the 60 Hz table; unknown widths fall
/// back to 1080p. 2160p at 50/60 Hz needs 4:2:0 on HDMI 1.4 sinks, which
/// `ycbcr420` selects.
pub fn native_mode_string(res: &ResolutionInfo, ycbcr420: bool) -> String {
    let refresh = (res.refresh_rate * 10.0) as i32;
    let width = res.screen_width;
    let uhd = |w: u32, r: u32| {
        if ycbcr420 {
            format!("{w}x2160p-{r}(YCbCr420)")
        } else {
            format!("{w}x2160p-{r}")
        }
    };

    match refresh {
        500 => match width {
            1280 => "1280x720p-50".to_string(),
            1920 if res.interlaced => "1920x1080i-50".to_string(),
            1920 => "1920x1080p-50".to_string(),
            3840 | 4096 => uhd(width, 50),
            _ => "1920x1080p-60".to_string(),
        },
        300 | 250 | 240 => {
            let r = refresh / 10;
            match width {
                3840 | 4096 => format!("{width}x2160p-{r}"),
                _ => format!("1920x1080p-{r}"),
            }
        }
        _ => match width {
            1280 => "1280x720p-60".to_string(),
            1920 if res.interlaced => "1920x1080i-60".to_string(),
            1920 => "1920x1080p-60".to_string(),
            3840 | 4096 => uhd(width, 60),
            _ => "1920x1080p-60".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progressive_mode() {
        let res = sys_mode_to_resolution("1920x1080p-60").unwrap();
        assert_eq!((res.width, res.height), (1920, 1080));
        assert_eq!(res.refresh_rate, 60.0);
        assert!(!res.interlaced);
        assert_eq!(res.subtitle_line, 1042);
        assert_eq!(res.label, "1920x1080 @ 60.00 - Full Screen");
        assert_eq!(res.id, "1920x1080p-60");
    }

    #[test]
    fn parses_interlaced_with_prefix_and_suffix() {
        let res = sys_mode_to_resolution("* 1920x1080i-50").unwrap();
        assert!(res.interlaced);
        assert_eq!(res.refresh_rate, 50.0);
        assert_eq!(res.label, "1920x1080 @ 50.00i - Full Screen");

        let uhd = sys_mode_to_resolution("3840x2160p-60(YCbCr420)").unwrap();
        assert_eq!((uhd.width, uhd.refresh_rate), (3840, 60.0));
        assert_eq!(uhd.id, "3840x2160p-60(YCbCr420)");
    }

    #[test]
    fn rejects_garbage() {
        assert!(sys_mode_to_resolution("bogus").is_none());
        assert!(sys_mode_to_resolution("").is_none());
        assert!(sys_mode_to_resolution("1920x1080-60").is_none());
        assert!(sys_mode_to_resolution("0x0p-60").is_none());
    }

    #[test]
    fn capability_lines() {
        let caps = parse_3d_capabilities(
            "1920x1080p-24,321\n1280x720p-60,65\ncur3dmode=-1\njunk\n1920x1080p-60,x\n",
        );
        assert_eq!(caps.len(), 2);
        assert_eq!(
            caps[0].modes(),
            vec![
                Display3dMode::FramePacking,
                Display3dMode::SideBySide,
                Display3dMode::TopBottom
            ]
        );
        assert_eq!(
            caps[1].modes(),
            vec![Display3dMode::FramePacking, Display3dMode::SideBySide]
        );
        assert!(caps[0].applies_to("1920X1080P-24"));
        assert!(!caps[0].applies_to("1280x720p-60"));
    }

    #[test]
    fn current_3d_mode_line() {
        assert_eq!(parse_current_3d_mode("1920x1080p-24,1\ncur3dmode=8\n"), 8);
        assert_eq!(parse_current_3d_mode("cur3dmode=-1"), -1);
        assert_eq!(parse_current_3d_mode("1920x1080p-24,1"), -1);
    }

    fn request(width: u32, refresh: f32, interlaced: bool) -> ResolutionInfo {
        ResolutionInfo {
            screen_width: width,
            refresh_rate: refresh,
            interlaced,
            ..Default::default()
        }
    }

    #[test]
    fn mode_table() {
        assert_eq!(native_mode_string(&request(1280, 60.0, false), true), "1280x720p-60");
        assert_eq!(native_mode_string(&request(1920, 50.0, true), true), "1920x1080i-50");
        assert_eq!(
            native_mode_string(&request(3840, 60.0, false), true),
            "3840x2160p-60(YCbCr420)"
        );
        assert_eq!(native_mode_string(&request(4096, 50.0, false), false), "4096x2160p-50");
        assert_eq!(native_mode_string(&request(3840, 24.0, false), true), "3840x2160p-24");
        assert_eq!(native_mode_string(&request(1280, 24.0, false), true), "1920x1080p-24");
        assert_eq!(native_mode_string(&request(1920, 23.976, false), true), "1920x1080p-60");
        assert_eq!(native_mode_string(&request(720, 50.0, false), true), "1920x1080p-60");
    }
}
