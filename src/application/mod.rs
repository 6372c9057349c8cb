// Application layer - Use cases over the backend port
pub mod background;
pub mod chart_service;
pub mod dashboard_api;
pub mod live_service;
pub mod mesh_cache;
pub mod playback_service;
pub mod shell_service;
pub mod simulation_service;
