//! Lane-driving simulator.
//!
//! A car drives up a straight multi-lane road (towards decreasing `y`, as on
//! a canvas) past slower traffic. The agent sees a fan of ray sensors; each
//! reading is `1 - distance / ray_length` to the nearest obstacle, or 0 when
//! the ray hits nothing.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::{Environment, Route, State, StepStatus};
use crate::error::{PilotError, Result};

pub const ACTION_STRAIGHT: usize = 0;
pub const ACTION_RIGHT: usize = 1;
pub const ACTION_LEFT: usize = 2;

const BORDER_REACH: f32 = 1.0e7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighwayConfig {
    pub lane_count: usize,
    pub road_center: f32,
    pub road_width: f32,
    pub car_width: f32,
    pub car_length: f32,
    pub start_position: f32,
    pub route_length: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub friction: f32,
    pub turn_rate: f32,
    pub ray_count: usize,
    pub ray_length: f32,
    pub ray_spread: f32,
    pub traffic_count: usize,
    pub traffic_min_gap: f32,
    pub traffic_max_gap: f32,
    pub traffic_speed: f32,
    pub traffic_speed_std: f32,
    pub max_episode_steps: usize,
}

impl Default for HighwayConfig {
    fn default() -> Self {
        HighwayConfig {
            lane_count: 3,
            road_center: 150.0,
            road_width: 270.0,
            car_width: 50.0,
            car_length: 75.0,
            start_position: -100.0,
            route_length: 6000.0,
            max_speed: 3.0,
            acceleration: 0.2,
            friction: 0.05,
            turn_rate: 0.03,
            ray_count: 5,
            ray_length: 150.0,
            ray_spread: std::f32::consts::FRAC_PI_2,
            traffic_count: 30,
            traffic_min_gap: 100.0,
            traffic_max_gap: 200.0,
            traffic_speed: 2.0,
            traffic_speed_std: 0.3,
            max_episode_steps: 10_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Point {
    x: f32,
    y: f32,
}

impl Point {
    fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Intersection of segments `a-b` and `c-d`, as the fraction along `a-b`.
fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<f32> {
    let t_top = (d.x - c.x) * (a.y - c.y) - (d.y - c.y) * (a.x - c.x);
    let u_top = (c.y - a.y) * (a.x - b.x) - (c.x - a.x) * (a.y - b.y);
    let bottom = (d.y - c.y) * (b.x - a.x) - (d.x - c.x) * (b.y - a.y);
    if bottom == 0.0 {
        return None;
    }
    let t = t_top / bottom;
    let u = u_top / bottom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

fn edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    (0..polygon.len()).map(move |i| (polygon[i], polygon[(i + 1) % polygon.len()]))
}

fn polygons_touch(p1: &[Point], p2: &[Point]) -> bool {
    edges(p1).any(|(a, b)| edges(p2).any(|(c, d)| segment_intersection(a, b, c, d).is_some()))
}

/// Corners of a `width` x `length` box centred on (x, y), rotated by `angle`.
fn body_polygon(x: f32, y: f32, width: f32, length: f32, angle: f32) -> [Point; 4] {
    let radius = width.hypot(length) / 2.0;
    let alpha = width.atan2(length);
    let corner = |theta: f32| Point::new(x - theta.sin() * radius, y - theta.cos() * radius);
    [
        corner(angle - alpha),
        corner(angle + alpha),
        corner(std::f32::consts::PI + angle - alpha),
        corner(std::f32::consts::PI + angle + alpha),
    ]
}

#[derive(Clone, Debug)]
struct Vehicle {
    x: f32,
    y: f32,
    speed: f32,
    angle: f32,
}

/// The driving environment.
#[derive(Clone, Debug)]
pub struct Highway {
    config: HighwayConfig,
    car: Vehicle,
    traffic: Vec<Vehicle>,
    traffic_speed: Normal<f32>,
    steps: usize,
    rng: StdRng,
}

impl Highway {
    pub fn new(config: HighwayConfig, seed: u64) -> Result<Self> {
        if config.lane_count == 0 || config.ray_count == 0 {
            return Err(PilotError::invalid_parameter(
                "highway",
                "lane_count and ray_count must be positive",
            ));
        }
        if config.traffic_min_gap > config.traffic_max_gap {
            return Err(PilotError::invalid_parameter(
                "highway.trafficMinGap",
                "must not exceed trafficMaxGap",
            ));
        }
        let traffic_speed = Normal::new(config.traffic_speed, config.traffic_speed_std)
            .map_err(|e| PilotError::invalid_parameter("highway.trafficSpeedStd".to_string(), e.to_string()))?;

        let car = Vehicle {
            x: 0.0,
            y: config.start_position,
            speed: 0.0,
            angle: 0.0,
        };
        let mut highway = Highway {
            config,
            car,
            traffic: Vec::new(),
            traffic_speed,
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
        };
        highway.reset()?;
        Ok(highway)
    }

    pub fn config(&self) -> &HighwayConfig {
        &self.config
    }

    fn lane_center(&self, lane: usize) -> f32 {
        let lane_width = self.config.road_width / self.config.lane_count as f32;
        self.left_border() + lane_width / 2.0 + lane.min(self.config.lane_count - 1) as f32 * lane_width
    }

    fn left_border(&self) -> f32 {
        self.config.road_center - self.config.road_width / 2.0
    }

    fn right_border(&self) -> f32 {
        self.config.road_center + self.config.road_width / 2.0
    }

    fn borders(&self) -> [(Point, Point); 2] {
        let (left, right) = (self.left_border(), self.right_border());
        [
            (Point::new(left, -BORDER_REACH), Point::new(left, BORDER_REACH)),
            (Point::new(right, -BORDER_REACH), Point::new(right, BORDER_REACH)),
        ]
    }

    fn spawn_traffic(&mut self) {
        self.traffic.clear();
        let mut y = self.config.start_position;
        for _ in 0..self.config.traffic_count {
            y -= self.rng.gen_range(self.config.traffic_min_gap..=self.config.traffic_max_gap);
            let lane = self.rng.gen_range(0..self.config.lane_count);
            let speed = self.traffic_speed.sample(&mut self.rng).max(0.5);
            self.traffic.push(Vehicle {
                x: self.lane_center(lane),
                y,
                speed,
                angle: 0.0,
            });
        }
    }

    fn polygon(&self, vehicle: &Vehicle) -> [Point; 4] {
        body_polygon(
            vehicle.x,
            vehicle.y,
            self.config.car_width,
            self.config.car_length,
            vehicle.angle,
        )
    }

    fn drive(&mut self, action: usize) {
        let config = &self.config;
        let car = &mut self.car;
        car.speed = (car.speed + config.acceleration).min(config.max_speed);
        if car.speed > 0.0 {
            car.speed = (car.speed - config.friction).max(0.0);
        }
        match action {
            ACTION_RIGHT => car.angle -= config.turn_rate,
            ACTION_LEFT => car.angle += config.turn_rate,
            _ => {}
        }
        car.x -= car.angle.sin() * car.speed;
        car.y -= car.angle.cos() * car.speed;

        for vehicle in &mut self.traffic {
            vehicle.y -= vehicle.speed;
        }
    }

    fn is_damaged(&self) -> bool {
        let body = self.polygon(&self.car);
        let hits_border = self
            .borders()
            .iter()
            .any(|&(c, d)| edges(&body).any(|(a, b)| segment_intersection(a, b, c, d).is_some()));
        hits_border
            || self
                .traffic
                .iter()
                .any(|vehicle| polygons_touch(&body, &self.polygon(vehicle)))
    }

    fn sense(&self) -> State {
        let config = &self.config;
        let origin = Point::new(self.car.x, self.car.y);
        let obstacles: Vec<(Point, Point)> = self
            .borders()
            .into_iter()
            .chain(self.traffic.iter().flat_map(|v| {
                let poly = self.polygon(v);
                edges(&poly).collect::<Vec<_>>()
            }))
            .collect();

        Array1::from_iter((0..config.ray_count).map(|i| {
            let fraction = if config.ray_count == 1 {
                0.5
            } else {
                i as f32 / (config.ray_count - 1) as f32
            };
            let angle = config.ray_spread / 2.0 - fraction * config.ray_spread + self.car.angle;
            let end = Point::new(
                origin.x - angle.sin() * config.ray_length,
                origin.y - angle.cos() * config.ray_length,
            );
            obstacles
                .iter()
                .filter_map(|&(c, d)| segment_intersection(origin, end, c, d))
                .fold(None, |nearest: Option<f32>, t| Some(nearest.map_or(t, |n| n.min(t))))
                .map_or(0.0, |t| 1.0 - t)
        }))
    }
}

impl Environment for Highway {
    fn reset(&mut self) -> Result<State> {
        self.car = Vehicle {
            x: self.lane_center(self.config.lane_count / 2),
            y: self.config.start_position,
            speed: 0.0,
            angle: 0.0,
        };
        self.steps = 0;
        self.spawn_traffic();
        Ok(self.sense())
    }

    fn step(&mut self, action: usize) -> Result<(StepStatus, State)> {
        if action >= self.num_actions() {
            return Err(PilotError::InvalidAction {
                action,
                num_actions: self.num_actions(),
            });
        }
        self.drive(action);
        self.steps += 1;

        let status = if self.is_damaged() {
            StepStatus::Dead
        } else if self.progress() >= self.config.route_length {
            StepStatus::Done
        } else if self.steps >= self.config.max_episode_steps {
            StepStatus::Dead
        } else {
            StepStatus::Running
        };
        Ok((status, self.sense()))
    }

    fn num_actions(&self) -> usize {
        3
    }

    fn observation_size(&self) -> usize {
        self.config.ray_count
    }

    fn position(&self) -> f32 {
        self.car.y
    }

    fn route(&self) -> Route {
        Route::new(
            self.config.start_position,
            self.config.start_position - self.config.route_length,
        )
    }
}
