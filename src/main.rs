use manage_externals::presentation::cli::CliApp;

#[tokio::main]
async fn main() {
    // Run the CLI application; logging is set up from its flags
    let code = CliApp::new().run().await;
    std::process::exit(code);
}
