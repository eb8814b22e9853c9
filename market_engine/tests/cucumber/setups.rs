use cucumber::given;

use crate::cucumber::{market_world::MarketSystem, MarketWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketWorld) {
    let system = MarketSystem::new().await;
    world.system = Some(system);
}
