// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,

        // --- Profile ---
        handlers::auth::get_me,
        handlers::auth::update_me,
        handlers::auth::change_password,
        handlers::auth::upload_avatar,

        // --- Users & Companies ---
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::list_companies,
        handlers::users::get_company,
        handlers::users::create_company,
        handlers::users::update_company,
        handlers::users::delete_company,

        // --- Permissions ---
        handlers::permissions::list_mine,
        handlers::permissions::list_for_user,
        handlers::permissions::replace_for_user,

        // --- Hotels ---
        handlers::hotels::list_hotels,
        handlers::hotels::get_hotel,
        handlers::hotels::create_hotel,
        handlers::hotels::update_hotel,
        handlers::hotels::delete_hotel,
        handlers::hotels::list_room_types,
        handlers::hotels::create_room_type,
        handlers::hotels::update_room_type,
        handlers::hotels::delete_room_type,
        handlers::hotels::list_rate_categories,
        handlers::hotels::create_rate_category,
        handlers::hotels::update_rate_category,
        handlers::hotels::delete_rate_category,

        // --- Uploads ---
        handlers::uploads::upload_file,
        handlers::uploads::list_uploads,
        handlers::uploads::get_upload,
        handlers::uploads::list_rows,
        handlers::uploads::confirm_upload,
        handlers::uploads::delete_upload,
        handlers::uploads::hotel_data,

        // --- Scraping ---
        handlers::scrape::list_sources,
        handlers::scrape::create_source,
        handlers::scrape::update_source,
        handlers::scrape::delete_source,
        handlers::scrape::list_rates,
        handlers::scrape::run_scrape,

        // --- Billing ---
        handlers::billing::list_plans,
        handlers::billing::current_subscription,
        handlers::billing::checkout,
        handlers::billing::verify_payment,
        handlers::billing::cancel_subscription,
        handlers::billing::list_payments,

        // --- Support ---
        handlers::support::create_ticket,
        handlers::support::list_tickets,
        handlers::support::get_ticket,
        handlers::support::reply_ticket,
        handlers::support::update_ticket_status,
        handlers::support::delete_ticket,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::delete_notification,

        // --- Forecast ---
        handlers::forecast::forecast,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::UpdateProfilePayload,
            models::auth::ChangePasswordPayload,
            models::auth::ForgotPasswordPayload,
            models::auth::ResetPasswordPayload,
            models::auth::AuthResponse,

            // --- Companies ---
            models::company::Company,
            models::company::CreateCompanyPayload,
            models::company::UpdateCompanyPayload,
            models::company::CreateUserPayload,
            models::company::UpdateUserPayload,

            // --- Permissions ---
            models::permission::PermissionModule,
            models::permission::PermissionAction,
            models::permission::UserPermission,
            models::permission::ModuleGrant,
            models::permission::ReplacePermissionsPayload,

            // --- Hotels ---
            models::hotel::Hotel,
            models::hotel::RoomType,
            models::hotel::RateCategory,
            models::hotel::HotelDetail,
            models::hotel::HotelPayload,
            models::hotel::RoomTypePayload,
            models::hotel::RateCategoryPayload,

            // --- Uploads ---
            models::upload::FileType,
            models::upload::UploadStatus,
            models::upload::ExtractRowStatus,
            models::upload::BookingRow,
            models::upload::CompetitorRow,
            models::upload::StrRow,
            models::upload::PriceRow,
            models::upload::ExtractedRow,
            models::upload::UploadData,
            models::upload::MetaUploadData,
            models::upload::UploadedExtractDataFile,
            models::upload::UploadDetail,
            models::upload::UploadAccepted,
            models::upload::ConfirmUploadPayload,

            // --- Scraping ---
            models::scrape::SourceType,
            models::scrape::ScrapeSourceHotel,
            models::scrape::ScrapedRate,
            models::scrape::ScrapeSourcePayload,
            models::scrape::ScrapeRunPayload,
            models::scrape::ScrapeRunSummary,

            // --- Billing ---
            models::billing::SubscriptionStatus,
            models::billing::PaymentStatus,
            models::billing::SubscriptionPlan,
            models::billing::UserSubscription,
            models::billing::Payment,
            models::billing::CurrentSubscription,
            models::billing::CheckoutPayload,
            models::billing::CheckoutResponse,
            models::billing::VerifyPaymentPayload,
            models::billing::VerifyPaymentResponse,

            // --- Support ---
            models::support::TicketPriority,
            models::support::TicketStatus,
            models::support::SupportTicket,
            models::support::SupportTicketThread,
            models::support::TicketDetail,
            models::support::UpdateTicketStatusPayload,

            // --- Notifications ---
            models::notification::Notification,
            models::notification::UnreadCount,

            // --- Forecast ---
            models::forecast::ForecastPayload,
            models::forecast::ForecastDay,
            models::forecast::ForecastResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login and password recovery"),
        (name = "Profile", description = "The signed-in user's own account"),
        (name = "Users", description = "Company user management"),
        (name = "Companies", description = "Tenant administration (super admin)"),
        (name = "Permissions", description = "Per-module access grants"),
        (name = "Hotels", description = "Hotels, room types and rate categories"),
        (name = "Uploads", description = "Spreadsheet ingestion and extracted data"),
        (name = "Scraping", description = "Competitor rate sources and scraped rates"),
        (name = "Billing", description = "Plans, subscriptions and payments"),
        (name = "Support", description = "Support tickets and replies"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Forecast", description = "AI occupancy and pricing forecast")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
