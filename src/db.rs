pub mod billing_repo;
pub use billing_repo::BillingRepository;
pub mod company_repo;
pub use company_repo::CompanyRepository;
pub mod hotel_repo;
pub use hotel_repo::HotelRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
pub mod permission_repo;
pub use permission_repo::PermissionRepository;
pub mod scrape_repo;
pub use scrape_repo::ScrapeRepository;
pub mod support_repo;
pub use support_repo::SupportRepository;
pub mod upload_repo;
pub use upload_repo::UploadRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
