use utoipa::OpenApi;

use crate::routes::{files, health, process, tasks, upload};

#[derive(OpenApi)]
#[openapi(info(
    title = "clipforge-server",
    description = "Video clipping and captioning API: download, cut, transcribe, caption, crop",
    version = "0.1.0",
    contact(name = "clipforge", url = "https://github.com/clipforge/clipforge")
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(process::ProcessApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root.merge(files::FilesApi::openapi());
    root.merge(upload::UploadApi::openapi());
    root
}
