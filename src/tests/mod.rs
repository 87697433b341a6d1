// Test modules for all components
pub mod test_agent;
pub mod test_exploration;
pub mod test_layers;
pub mod test_network;
