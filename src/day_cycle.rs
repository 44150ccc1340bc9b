use std::f32::consts::TAU;

#[derive(Clone, Copy, Debug)]
pub struct DayLightSample {
    /// Time of day in `[0, 1)`; 0.25 is noon.
    pub time_of_day: f32,
    pub brightness: f32,
    pub sky: [f32; 3],
    pub sun_dir: [f32; 3],
    pub sun_visible: bool,
}

impl DayLightSample {
    pub fn sky_rgb8(&self) -> [u8; 3] {
        self.sky.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Grey level for tinting terrain, never fully black.
    pub fn terrain_tint(&self) -> u8 {
        ((0.25 + 0.75 * self.brightness).clamp(0.0, 1.0) * 255.0).round() as u8
    }

    pub fn hour(&self) -> f32 {
        // time_of_day 0 is sunrise (06:00).
        (self.time_of_day * 24.0 + 6.0).rem_euclid(24.0)
    }
}

pub struct DayCycle {
    time: f32,
    day_length: f32,
}

impl DayCycle {
    pub fn new(day_length: f32) -> Self {
        Self {
            time: 0.0,
            day_length: day_length.max(1.0),
        }
    }

    pub fn day_length(&self) -> f32 {
        self.day_length
    }

    pub fn advance(&mut self, dt: f32) -> DayLightSample {
        self.time = (self.time + dt).rem_euclid(self.day_length);
        self.sample()
    }

    /// Jumps by a fraction of a day, wrapping in both directions.
    pub fn scrub(&mut self, fraction: f32) -> DayLightSample {
        self.advance(fraction * self.day_length)
    }

    pub fn sample(&self) -> DayLightSample {
        let frac = (self.time / self.day_length).rem_euclid(1.0);
        let phase = frac * TAU;
        let elevation = phase.sin();
        let sky_scale = 0.5 * (1.0 + elevation);
        let brightness = sky_scale.powf(1.5);
        let day_sky = [0.53, 0.72, 0.9];
        let night_sky = [0.04, 0.05, 0.08];
        let base = lerp3(night_sky, day_sky, brightness);
        // Warm tint near the horizon crossings.
        let twilight = phase.cos().abs().powf(3.0);
        let warm = (0.35 * twilight * sky_scale).clamp(0.0, 0.5);
        let sky = lerp3(base, [1.0, 0.63, 0.32], warm);
        // Tilted on z so the sun arcs instead of sweeping a flat plane.
        let sun_dir = normalize([phase.cos(), (elevation * 1.05).clamp(-1.0, 1.0), 0.25]);
        DayLightSample {
            time_of_day: frac,
            brightness,
            sky,
            sun_dir,
            sun_visible: sun_dir[1] > 0.0,
        }
    }
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > 0.0 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 1.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noon_is_brighter_than_midnight() {
        let mut c = DayCycle::new(100.0);
        let noon = c.advance(25.0);
        let midnight = c.advance(50.0);
        assert!(noon.sun_visible);
        assert!(!midnight.sun_visible);
        assert!(noon.brightness > 0.99);
        assert!(midnight.brightness < 0.01);
        assert!(noon.terrain_tint() > midnight.terrain_tint());
        assert!((noon.hour() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn time_wraps_and_sun_is_unit_length() {
        let mut c = DayCycle::new(10.0);
        let a = c.advance(3.0);
        let b = c.advance(10.0);
        assert!((a.time_of_day - b.time_of_day).abs() < 1e-5);
        let back = c.scrub(-0.5);
        assert!((back.time_of_day - 0.8).abs() < 1e-5);
        let d = back.sun_dir;
        let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn day_length_has_a_floor() {
        assert_eq!(DayCycle::new(0.0).day_length(), 1.0);
    }
}
