use crate::commands::Context;
use crate::error::HangarError;
use crate::infra::clipboard;

async fn require_live(ctx: &Context, name: &str) -> Result<(), HangarError> {
    if ctx.mux.exists(name).await? {
        Ok(())
    } else {
        Err(HangarError::NotFound(name.to_string()))
    }
}

pub async fn capture(ctx: &Context, name: &str, start: i32) -> Result<String, HangarError> {
    require_live(ctx, name).await?;
    ctx.mux.capture_pane(name, start).await
}

pub async fn execute_capture(
    ctx: &Context,
    name: &str,
    start: i32,
    copy: bool,
) -> Result<(), HangarError> {
    let content = capture(ctx, name, start).await?;
    if copy {
        clipboard::copy_text(&content)?;
        eprintln!("Copied {} lines from '{name}'", content.lines().count());
    } else {
        println!("{content}");
    }
    Ok(())
}

pub async fn execute_send(ctx: &Context, name: &str, text: &str) -> Result<(), HangarError> {
    require_live(ctx, name).await?;
    ctx.mux.send_text(name, text).await
}
