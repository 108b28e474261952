pub mod attachments;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod news;
pub mod pages;
pub mod posts;
pub mod stocks;
pub mod tags;
pub mod themes;
pub mod tools;
pub mod uploads;
pub mod users;

/// Everything mounted under `/api`.
pub fn routes() -> Vec<rocket::Route> {
    let mut routes = auth::routes();
    routes.extend(users::routes());
    routes.extend(posts::routes());
    routes.extend(categories::routes());
    routes.extend(tags::routes());
    routes.extend(comments::routes());
    routes.extend(pages::routes());
    routes.extend(attachments::routes());
    routes.extend(uploads::routes());
    routes.extend(tools::routes());
    routes.extend(news::routes());
    routes.extend(stocks::routes());
    routes.extend(themes::routes());
    routes
}
