use crate::commands::common::open_workspace;
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_delete(options: &GlobalOptions, list_query: &str) -> Result<(), CliError> {
    let workspace = open_workspace(options).await?;
    let result = async {
        let list = workspace.resolve_list(list_query).await?;
        workspace.gateway.delete(&list.id).await?;
        workspace.persist_view().await?;
        Ok::<_, CliError>(list)
    }
    .await;
    workspace.finish().await;

    println!("{}", result?.id);
    Ok(())
}
