mod app;
mod args;
mod logger;
mod prompt;
mod render;

use app::App;

#[tokio::main]
async fn main() {
    if !App::new().run().await {
        std::process::exit(1);
    }
}
