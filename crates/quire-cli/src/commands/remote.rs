use crate::commands::App;
use crate::error::CliError;

pub async fn run_auth(app: &App) -> Result<(), CliError> {
    app.manager.authenticate(None).await?;
    println!("Credentials accepted");
    Ok(())
}

pub async fn run_check(app: &App) -> Result<(), CliError> {
    app.manager.is_server_compatible(None).await?;
    println!("Server is compatible");
    Ok(())
}
