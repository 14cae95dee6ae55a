// HTTP surface for the headless simulation - a renderer polls the snapshot
// endpoints, a controller posts parameter updates and lifecycle commands.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::{ConfigUpdate, SimulationConfig};
use crate::simulation::Simulation;
use rand::rngs::StdRng;

// Serializable versions of simulation data for API responses
#[derive(Serialize, Clone)]
pub struct MarbleData {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub consumed: bool,
    pub parent: Option<usize>,
}

#[derive(Serialize, Clone)]
pub struct StatsData {
    pub marble_count: usize,
    pub consumed_count: usize,
    pub active_tip_count: usize,
    pub target_hue: f32,
    pub tick_count: u64,
}

#[derive(Serialize, Clone)]
pub struct SimulationStateResponse {
    pub marbles: Vec<MarbleData>,
    pub target_hue: f32,
    pub width: f32,
    pub height: f32,
    pub stats: StatsData,
}

#[derive(Deserialize)]
pub struct StepQuery {
    pub steps: Option<usize>,
}

#[derive(Deserialize)]
pub struct SpeedQuery {
    pub value: f32,
}

#[derive(Deserialize)]
pub struct ResizeQuery {
    pub width: f32,
    pub height: f32,
}

// Shared state for the API server
#[derive(Clone)]
pub struct ApiState {
    pub simulation: Arc<Mutex<Simulation>>,
    pub rng: Arc<Mutex<StdRng>>,
}

impl ApiState {
    pub fn new(sim: Simulation, rng: StdRng) -> Self {
        Self {
            simulation: Arc::new(Mutex::new(sim)),
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

// Helper function to convert simulation state to API response
fn simulation_to_response(sim: &Simulation) -> SimulationStateResponse {
    let (marble_count, consumed_count, active_tip_count) = sim.stats();

    SimulationStateResponse {
        marbles: sim
            .state
            .marbles
            .iter()
            .map(|m| MarbleData {
                id: m.id,
                x: m.x,
                y: m.y,
                radius: m.radius,
                hue: m.hue,
                saturation: m.saturation,
                brightness: m.brightness,
                consumed: m.consumed,
                parent: m.parent,
            })
            .collect(),
        target_hue: sim.state.target_hue,
        width: sim.config.width,
        height: sim.config.height,
        stats: StatsData {
            marble_count,
            consumed_count,
            active_tip_count,
            target_hue: sim.state.target_hue,
            tick_count: sim.state.tick_count,
        },
    }
}

// GET /state - Get current simulation state
async fn get_state(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(simulation_to_response(&sim)))
}

// GET /stats - Get simulation statistics
async fn get_stats(State(api_state): State<ApiState>) -> Result<Json<StatsData>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let (marble_count, consumed_count, active_tip_count) = sim.stats();
    Ok(Json(StatsData {
        marble_count,
        consumed_count,
        active_tip_count,
        target_hue: sim.state.target_hue,
        tick_count: sim.state.tick_count,
    }))
}

// POST /step - Step the simulation forward
async fn step_simulation(
    Query(params): Query<StepQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut rng = api_state
        .rng
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let steps = params.steps.unwrap_or(1);

    for _ in 0..steps {
        sim.tick(&mut *rng);
    }

    Ok(Json(simulation_to_response(&sim)))
}

// POST /reset - Reset the simulation with a fresh field
async fn reset_simulation(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut rng = api_state
        .rng
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    sim.reset(&mut *rng);

    Ok(Json(simulation_to_response(&sim)))
}

// POST /resize - New domain dimensions, wholesale reset
async fn resize_simulation(
    Query(params): Query<ResizeQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut rng = api_state
        .rng
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    sim.resize(&mut *rng, params.width, params.height);

    Ok(Json(simulation_to_response(&sim)))
}

// POST /pause - Toggle pause
async fn pause_simulation(
    State(api_state): State<ApiState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sim.toggle_pause();
    Ok(Json(serde_json::json!({ "paused": sim.paused })))
}

// POST /speed - Set the pacing multiplier for the background loop
async fn set_speed(
    Query(params): Query<SpeedQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sim.set_speed(params.value);
    Ok(Json(
        serde_json::json!({ "speed_multiplier": sim.speed_multiplier }),
    ))
}

// GET /config - Get simulation configuration
async fn get_config(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationConfig>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(sim.config.clone()))
}

// POST /config - Apply a partial configuration update between ticks
async fn update_config(
    State(api_state): State<ApiState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<SimulationConfig>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sim.update_config(&update);
    Ok(Json(sim.config.clone()))
}

// Create the API router
pub fn create_router(api_state: ApiState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/stats", get(get_stats))
        .route("/step", post(step_simulation))
        .route("/reset", post(reset_simulation))
        .route("/resize", post(resize_simulation))
        .route("/pause", post(pause_simulation))
        .route("/speed", post(set_speed))
        .route("/config", get(get_config).post(update_config))
        .layer(CorsLayer::permissive())
        .with_state(api_state)
}

// Run the API server with automatic simulation stepping
pub async fn run_server(api_state: ApiState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(api_state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port, "rootrust headless API server listening");
    info!("GET /state, GET /stats, GET /config for snapshots");
    info!("POST /step?steps=N, /config, /pause, /speed?value=X, /reset, /resize?width=W&height=H");

    // Spawn background task to continuously step the simulation
    let simulation_task = tokio::spawn(simulation_loop(api_state.clone()));

    // Run the server
    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    // Wait for either task to complete
    tokio::select! {
        result = server_handle => {
            result??;
        }
        _ = simulation_task => {
            warn!("simulation loop ended unexpectedly");
        }
    }

    Ok(())
}

// Background task that continuously steps the simulation
async fn simulation_loop(api_state: ApiState) {
    // Target tick rate; the speed multiplier scales it fractionally.
    const TARGET_FPS: f32 = 60.0;
    let frame_duration = std::time::Duration::from_secs_f32(1.0 / TARGET_FPS);

    loop {
        let start = std::time::Instant::now();

        // Step simulation if not paused
        {
            let mut sim = match api_state.simulation.lock() {
                Ok(sim) => sim,
                Err(_) => break,
            };

            if !sim.paused {
                let mut rng = match api_state.rng.lock() {
                    Ok(rng) => rng,
                    Err(_) => break,
                };

                // Handle speed multiplier with accumulator for fractional speeds
                sim.speed_accumulator += sim.speed_multiplier;
                let steps = sim.speed_accumulator.floor() as usize;
                sim.speed_accumulator -= steps as f32;

                for _ in 0..steps {
                    sim.tick(&mut *rng);
                }
            }
        }

        // Sleep to maintain target FPS
        let elapsed = start.elapsed();
        if elapsed < frame_duration {
            tokio::time::sleep(frame_duration - elapsed).await;
        }
    }
}
