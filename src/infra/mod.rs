// Adapters for the application ports
pub mod drive;
pub mod google_auth;
pub mod spreadsheet;
pub mod yandex_gpt;

pub use drive::GoogleDriveUploader;
pub use spreadsheet::CsvSpreadsheetSink;
pub use yandex_gpt::YandexGptModel;
