use agora_core::model::blog::{BlogListQuery, BlogPostDraft, BlogPostPatch, PostStatus};
use agora_core::model::user::{NewUser, User};
use agora_core::service::blog_service::search_published;
use agora_core::{
    open_db_in_memory, BlogService, PageRequest, ServiceError, SqliteBlogRepository,
    SqliteUserRepository, UserRepository,
};
use rusqlite::Connection;

// 2024-05-01T12:00:00Z and the following day.
const MAY_FIRST_MS: i64 = 1_714_564_800_000;
const MAY_SECOND_MS: i64 = MAY_FIRST_MS + 24 * 60 * 60 * 1000;

fn create_user(conn: &mut Connection, username: &str, is_staff: bool) -> User {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&NewUser {
        username: username.to_string(),
        email: String::new(),
        password_hash: "unused".to_string(),
        bio: String::new(),
        is_staff,
    })
    .unwrap()
}

fn published(title: &str, content: &str, at: i64) -> BlogPostDraft {
    BlogPostDraft {
        title: title.to_string(),
        content: content.to_string(),
        status: Some(PostStatus::Published),
        published_at: Some(at),
        ..BlogPostDraft::default()
    }
}

#[test]
fn slug_and_excerpt_are_derived() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());

    let post = service
        .create_post(
            &author,
            BlogPostDraft {
                title: "  Hello, Rust World!  ".to_string(),
                content: "<p>First <em>paragraph</em>.</p>".to_string(),
                ..BlogPostDraft::default()
            },
        )
        .unwrap();
    assert_eq!(post.title, "Hello, Rust World!");
    assert_eq!(post.slug, "hello-rust-world");
    assert_eq!(post.excerpt, "First paragraph.");
    assert_eq!(post.status, PostStatus::Draft);
    assert!(post.allow_comments);
    assert_eq!(post.author.username, "writer");
}

#[test]
fn blank_excerpt_is_derived_from_content() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());

    for blank in ["", "   "] {
        let post = service
            .create_post(
                &author,
                BlogPostDraft {
                    title: "Blank Excerpt".to_string(),
                    content: "<h2>Intro</h2> Body text".to_string(),
                    excerpt: Some(blank.to_string()),
                    ..BlogPostDraft::default()
                },
            )
            .unwrap();
        assert_eq!(post.excerpt, "Intro Body text");
    }

    let explicit = service
        .create_post(
            &author,
            BlogPostDraft {
                title: "Explicit Excerpt".to_string(),
                content: "body".to_string(),
                excerpt: Some("  Hand written  ".to_string()),
                ..BlogPostDraft::default()
            },
        )
        .unwrap();
    assert_eq!(explicit.excerpt, "Hand written");
}

#[test]
fn publish_time_outside_calendar_range_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());

    for at in [i64::MAX, -1] {
        match service.create_post(&author, published("Far Future", "body", at)) {
            Err(ServiceError::Validation(err)) => assert_eq!(err.field, "published_at"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    let last_day = service
        .create_post(&author, published("Far Future", "body", 253_402_300_799_999))
        .unwrap();
    assert_eq!(last_day.published_at, 253_402_300_799_999);
}

#[test]
fn same_day_slug_clash_gets_a_numeric_suffix() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());

    let first = service
        .create_post(&author, published("Weekly Notes", "one", MAY_FIRST_MS))
        .unwrap();
    let second = service
        .create_post(&author, published("Weekly Notes", "two", MAY_FIRST_MS + 1_000))
        .unwrap();
    let third = service
        .create_post(&author, published("Weekly Notes", "three", MAY_FIRST_MS + 2_000))
        .unwrap();
    let next_day = service
        .create_post(&author, published("Weekly Notes", "four", MAY_SECOND_MS))
        .unwrap();

    assert_eq!(first.slug, "weekly-notes");
    assert_eq!(second.slug, "weekly-notes-2");
    assert_eq!(third.slug, "weekly-notes-3");
    assert_eq!(next_day.slug, "weekly-notes");
}

#[test]
fn drafts_are_hidden_from_other_readers() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let reader = create_user(&mut conn, "reader", false);
    let editor = create_user(&mut conn, "editor", true);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());

    let draft = service
        .create_post(
            &author,
            BlogPostDraft {
                title: "Work in progress".to_string(),
                content: "not yet".to_string(),
                ..BlogPostDraft::default()
            },
        )
        .unwrap();
    service
        .create_post(&author, published("Live", "visible", MAY_FIRST_MS))
        .unwrap();

    assert!(matches!(
        service.get_post(None, draft.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.get_post(Some(&reader), draft.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert_eq!(service.get_post(Some(&author), draft.id).unwrap().view_count, 0);
    assert_eq!(service.get_post(Some(&editor), draft.id).unwrap().id, draft.id);

    let page = PageRequest::default();
    let query = BlogListQuery::default();
    assert_eq!(service.list_posts(None, &query, &page).unwrap().count, 1);
    assert_eq!(service.list_posts(Some(&reader), &query, &page).unwrap().count, 1);
    assert_eq!(service.list_posts(Some(&author), &query, &page).unwrap().count, 2);
    assert_eq!(service.total_published().unwrap(), 1);
}

#[test]
fn reading_a_published_post_increments_views() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());
    let post = service
        .create_post(&author, published("Popular", "read me", MAY_FIRST_MS))
        .unwrap();

    assert_eq!(service.get_post(None, post.id).unwrap().view_count, 1);
    assert_eq!(service.get_post(None, post.id).unwrap().view_count, 2);
    assert_eq!(service.get_post(Some(&author), post.id).unwrap().view_count, 3);
}

#[test]
fn blog_list_is_newest_first_with_page_size_five() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());
    for n in 0..7 {
        service
            .create_post(
                &author,
                published(&format!("Post {n}"), "body", MAY_FIRST_MS + n * 60_000),
            )
            .unwrap();
    }

    let page = service
        .list_posts(None, &BlogListQuery::default(), &PageRequest::default())
        .unwrap();
    assert_eq!(page.count, 7);
    assert_eq!(page.page_size, 5);
    assert_eq!(page.results.len(), 5);
    assert_eq!(page.results[0].title, "Post 6");
    assert_eq!(page.next, Some(2));
}

#[test]
fn tags_are_normalized_replaced_and_counted() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());

    let mut draft = published("Tagged", "body", MAY_FIRST_MS);
    draft.tags = vec![" Rust ".to_string(), "rust".to_string(), "Web".to_string()];
    let post = service.create_post(&author, draft).unwrap();
    assert_eq!(post.tags, vec!["rust", "web"]);

    let mut other = published("Also tagged", "body", MAY_FIRST_MS);
    other.tags = vec!["rust".to_string()];
    service.create_post(&author, other).unwrap();

    let popular = service.popular_tags(10).unwrap();
    assert_eq!(popular[0].name, "rust");
    assert_eq!(popular[0].posts, 2);

    let retagged = service
        .set_tags(&author, post.id, &["Databases".to_string()])
        .unwrap();
    assert_eq!(retagged.tags, vec!["databases"]);
    assert!(matches!(
        service.set_tags(&author, post.id, &["   ".to_string()]),
        Err(ServiceError::Validation(_))
    ));

    let by_tag = service
        .list_posts(
            None,
            &BlogListQuery {
                tag: Some("RUST".to_string()),
                author_id: None,
            },
            &PageRequest::default(),
        )
        .unwrap();
    assert_eq!(by_tag.count, 1);
    assert_eq!(by_tag.results[0].title, "Also tagged");
}

#[test]
fn only_author_or_staff_may_modify() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    let reader = create_user(&mut conn, "reader", false);
    let editor = create_user(&mut conn, "editor", true);
    let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());
    let post = service
        .create_post(&author, published("Original", "body", MAY_FIRST_MS))
        .unwrap();

    let patch = BlogPostPatch {
        title: Some("Defaced".to_string()),
        ..BlogPostPatch::default()
    };
    assert!(matches!(
        service.update_post(&reader, post.id, patch),
        Err(ServiceError::PermissionDenied(_))
    ));

    let updated = service
        .update_post(
            &editor,
            post.id,
            BlogPostPatch {
                status: Some(PostStatus::Draft),
                ..BlogPostPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.status, PostStatus::Draft);
    assert_eq!(updated.title, "Original");

    assert!(matches!(
        service.delete_post(&reader, post.id),
        Err(ServiceError::NotFound { .. })
    ));
    service.delete_post(&author, post.id).unwrap();
}

#[test]
fn full_text_search_covers_published_posts_only() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&mut conn, "writer", false);
    {
        let mut service = BlogService::new(SqliteBlogRepository::try_new(&mut conn).unwrap());
        service
            .create_post(
                &author,
                published("Ownership explained", "borrowing and lifetimes", MAY_FIRST_MS),
            )
            .unwrap();
        service
            .create_post(
                &author,
                BlogPostDraft {
                    title: "Secret draft".to_string(),
                    content: "borrowing secrets".to_string(),
                    ..BlogPostDraft::default()
                },
            )
            .unwrap();
    }

    let hits = search_published(&conn, "borrowing", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].slug, "ownership-explained");
    assert!(hits[0].snippet.contains("[borrowing]"));

    assert!(search_published(&conn, "borrowing lifetimes", 10).unwrap().len() == 1);
    assert!(search_published(&conn, "borrowing missing", 10).unwrap().is_empty());
    assert!(search_published(&conn, "   ", 10).unwrap().is_empty());
    assert!(search_published(&conn, "\"unbalanced", 10).unwrap().is_empty());
}
