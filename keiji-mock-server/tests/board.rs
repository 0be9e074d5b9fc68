use std::sync::Arc;

use keiji_client::{
    api::{
        Auth, CommentId, Error, NewComment, NewPost, NewSession, SessionChange, Store, User,
        Viewer, MAX_ATTACHMENT_BYTES,
    },
    NotificationFeed, PostsFeed, ThreadView,
};
use keiji_mock_server::MockServer;

fn server() -> Arc<MockServer> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(MockServer::new())
}

fn signup(server: &MockServer, name: &str) -> User {
    server
        .admin_create_user(name, &format!("{name}@example.org"), "correct horse", false)
        .unwrap_or_else(|e| panic!("creating {name}: {e}"))
}

async fn seed_post(server: &Arc<MockServer>, author: &User, body: &str) -> keiji_client::api::Post {
    server
        .insert_post(NewPost::new(author, body.to_string()))
        .await
        .expect("seeding post")
}

#[tokio::test]
async fn thread_refetches_on_comment_change() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let taro = signup(&server, "taro");
    let post = seed_post(&server, &hanako, "first post").await;

    let mut view = ThreadView::new(server.clone(), post.id);
    view.load().await.expect("initial load");
    view.subscribe().await.expect("subscribe");
    assert_eq!(view.data().unwrap().comments().len(), 0);

    // someone else comments out of band
    server
        .insert_comment(NewComment::new(&taro, post.id, "hello".to_string()))
        .await
        .expect("out-of-band comment");

    assert!(view.sync_next().await.expect("sync"));
    let data = view.data().unwrap();
    assert_eq!(data.comments().len(), 1);
    assert_eq!(data.comments()[0].body, "hello");
}

#[tokio::test]
async fn own_submit_then_refetch_does_not_duplicate() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let post = seed_post(&server, &hanako, "a post").await;

    let mut view = ThreadView::new(server.clone(), post.id);
    view.load().await.expect("load");
    view.subscribe().await.expect("subscribe");

    let stored = view
        .submit_comment(NewComment::new(&hanako, post.id, "mine".to_string()))
        .await
        .expect("submit");
    // shown immediately
    assert_eq!(view.data().unwrap().comments().len(), 1);

    // the change event for our own submit arrives and triggers a
    // refetch carrying the same id
    assert!(view.sync_next().await.expect("sync"));
    let data = view.data().unwrap();
    assert_eq!(data.comments().len(), 1);
    assert_eq!(data.comments()[0].id, stored.id);
}

#[tokio::test]
async fn reply_depth_is_enforced_end_to_end() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let post = seed_post(&server, &hanako, "deep thread").await;

    let mut view = ThreadView::new(server.clone(), post.id);
    view.load().await.expect("load");

    let mut parent: Option<CommentId> = None;
    for depth in 0..4 {
        let mut c = NewComment::new(&hanako, post.id, format!("depth {depth}"));
        if let Some(p) = parent {
            c = c.reply_to(p);
        }
        parent = Some(view.submit_comment(c).await.expect("submit").id);
    }

    let too_deep = NewComment::new(&hanako, post.id, "too deep".to_string())
        .reply_to(parent.expect("deepest comment"));
    assert!(matches!(
        view.submit_comment(too_deep).await,
        Err(Error::ReplyDepthExceeded)
    ));
}

#[tokio::test]
async fn replying_to_a_foreign_or_missing_parent_is_refused() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let post_a = seed_post(&server, &hanako, "post a").await;
    let post_b = seed_post(&server, &hanako, "post b").await;
    let on_b = server
        .insert_comment(NewComment::new(&hanako, post_b.id, "on b".to_string()))
        .await
        .expect("comment on b");

    // parent lives on another post
    let cross = NewComment::new(&hanako, post_a.id, "cross".to_string()).reply_to(on_b.id);
    assert!(matches!(
        server.insert_comment(cross).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn comments_fan_out_to_author_and_prior_commenters() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let taro = signup(&server, "taro");
    let jiro = signup(&server, "jiro");
    let post = seed_post(&server, &hanako, "popular post").await;

    server
        .insert_comment(NewComment::new(&taro, post.id, "first!".to_string()))
        .await
        .expect("taro comments");
    server
        .insert_comment(NewComment::new(&jiro, post.id, "second".to_string()))
        .await
        .expect("jiro comments");

    // hanako was notified twice, as post author
    let mut feed = NotificationFeed::new(server.clone(), hanako.id);
    feed.load().await.expect("load hanako");
    assert_eq!(feed.unread(), 2);
    assert!(feed
        .notifications()
        .iter()
        .all(|n| n.body == "commented on your post"));

    // taro once, as a prior commenter; jiro never notified about
    // their own comment
    let mut taro_feed = NotificationFeed::new(server.clone(), taro.id);
    taro_feed.load().await.expect("load taro");
    assert_eq!(taro_feed.unread(), 1);
    assert_eq!(
        taro_feed.notifications()[0].body,
        "also commented on a post you commented on"
    );

    let mut jiro_feed = NotificationFeed::new(server.clone(), jiro.id);
    jiro_feed.load().await.expect("load jiro");
    assert_eq!(jiro_feed.unread(), 0);
}

#[tokio::test]
async fn mark_all_read_survives_a_refetch() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let taro = signup(&server, "taro");
    let post = seed_post(&server, &hanako, "a post").await;
    server
        .insert_comment(NewComment::new(&taro, post.id, "ping".to_string()))
        .await
        .expect("comment");

    let mut feed = NotificationFeed::new(server.clone(), hanako.id);
    feed.load().await.expect("load");
    assert_eq!(feed.unread(), 1);

    feed.mark_all_read().await.expect("mark all");
    assert_eq!(feed.unread(), 0);
    // the flips were persisted, not just local
    feed.load().await.expect("reload");
    assert_eq!(feed.unread(), 0);
    assert_eq!(feed.notifications().len(), 1);

    feed.clear_all().await.expect("clear");
    feed.load().await.expect("reload after clear");
    assert!(feed.notifications().is_empty());
}

#[tokio::test]
async fn notification_feed_syncs_on_change() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let taro = signup(&server, "taro");
    let post = seed_post(&server, &hanako, "a post").await;

    let mut feed = NotificationFeed::new(server.clone(), hanako.id);
    feed.load().await.expect("load");
    feed.subscribe().await.expect("subscribe");
    assert_eq!(feed.unread(), 0);

    server
        .insert_comment(NewComment::new(&taro, post.id, "ping".to_string()))
        .await
        .expect("comment");

    assert!(feed.sync_next().await.expect("sync"));
    assert_eq!(feed.unread(), 1);
}

#[tokio::test]
async fn posts_feed_search_pin_and_delete() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let mut feed = PostsFeed::new(server.clone());

    let rust_post = feed
        .create_post(
            server.as_ref(),
            NewPost::new(&hanako, "threads in rust".to_string()),
            Vec::new(),
        )
        .await
        .expect("create rust post");
    let garden_post = feed
        .create_post(
            server.as_ref(),
            NewPost::new(&hanako, "gardening tips".to_string()),
            Vec::new(),
        )
        .await
        .expect("create garden post");

    feed.set_query("RUST");
    assert_eq!(feed.visible_posts().len(), 1);
    assert_eq!(feed.visible_posts()[0].id, rust_post.id);
    feed.set_query("");

    // pinning the older post moves it to the front
    feed.set_pinned(rust_post.id, true).await.expect("pin");
    assert_eq!(feed.posts()[0].id, rust_post.id);
    feed.load().await.expect("reload");
    assert_eq!(feed.posts()[0].id, rust_post.id);
    assert!(feed.posts()[0].pinned);

    feed.delete_post(garden_post.id).await.expect("delete");
    feed.load().await.expect("reload after delete");
    assert_eq!(feed.posts().len(), 1);
}

#[tokio::test]
async fn deleting_a_post_cascades_to_its_comments() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let post = seed_post(&server, &hanako, "doomed").await;
    server
        .insert_comment(NewComment::new(&hanako, post.id, "doomed too".to_string()))
        .await
        .expect("comment");

    server.delete_post(post.id).await.expect("delete");
    assert!(matches!(
        server.fetch_comments(post.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn attachments_upload_and_oversized_ones_are_refused() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let mut feed = PostsFeed::new(server.clone());

    let post = feed
        .create_post(
            server.as_ref(),
            NewPost::new(&hanako, "with a picture".to_string()),
            vec![("cat.png".to_string(), vec![0u8; 16])],
        )
        .await
        .expect("create with attachment");
    assert_eq!(post.image_urls.len(), 1);
    assert!(post.image_urls[0].starts_with("mock://objects/"));

    let huge = vec![0u8; MAX_ATTACHMENT_BYTES + 1];
    assert!(matches!(
        feed.create_post(
            server.as_ref(),
            NewPost::new(&hanako, "too big".to_string()),
            vec![("huge.png".to_string(), huge)],
        )
        .await,
        Err(Error::AttachmentTooLarge(_))
    ));
}

#[tokio::test]
async fn hidden_thread_is_masked_for_bystanders() {
    let server = server();
    let hanako = signup(&server, "hanako"); // post author
    let taro = signup(&server, "taro"); // hides their comment
    let jiro = signup(&server, "jiro"); // bystander
    let post = seed_post(&server, &hanako, "a post").await;

    let mut hidden = NewComment::new(&taro, post.id, "for few eyes".to_string());
    hidden.hidden = true;
    let hidden = server.insert_comment(hidden).await.expect("hidden comment");
    let reply = server
        .insert_comment(
            NewComment::new(&jiro, post.id, "reply".to_string()).reply_to(hidden.id),
        )
        .await
        .expect("reply");

    let mut view = ThreadView::new(server.clone(), post.id);
    view.load().await.expect("load");
    let data = view.data().unwrap();

    let as_viewer = |user: &User| Viewer::User {
        id: user.id,
        moderator: user.is_moderator,
    };

    // author of the hidden comment, and the post author, see it
    assert!(data.visibility(hidden.id, &as_viewer(&taro)).content_visible);
    assert!(data.visibility(hidden.id, &as_viewer(&hanako)).content_visible);
    // bystanders and anonymous viewers get the mask, with no badge
    let masked = data.visibility(hidden.id, &Viewer::Anonymous);
    assert!(!masked.content_visible);
    assert!(!masked.hidden_badge);

    // the reply inherits the mask, except for its own author
    assert!(data.visibility(reply.id, &as_viewer(&jiro)).content_visible);
    assert!(!data.visibility(reply.id, &Viewer::Anonymous).content_visible);
}

#[tokio::test]
async fn deleting_a_parent_keeps_replies_stored_but_unrendered() {
    let server = server();
    let hanako = signup(&server, "hanako");
    let post = seed_post(&server, &hanako, "a post").await;
    let parent = server
        .insert_comment(NewComment::new(&hanako, post.id, "parent".to_string()))
        .await
        .expect("parent");
    server
        .insert_comment(
            NewComment::new(&hanako, post.id, "child".to_string()).reply_to(parent.id),
        )
        .await
        .expect("child");

    let mut view = ThreadView::new(server.clone(), post.id);
    view.load().await.expect("load");
    view.delete_comment(parent.id).await.expect("delete parent");

    view.load().await.expect("reload");
    let data = view.data().unwrap();
    // the reply is still on record...
    assert_eq!(data.comments().len(), 1);
    // ...but the rendered forest is empty
    assert!(data.tree().is_empty());
}

#[tokio::test]
async fn session_lifecycle() {
    let server = server();
    signup(&server, "hanako");
    let mut sessions = server.session_feed().await.expect("session feed");

    let wrong = NewSession {
        user: "hanako".to_string(),
        password: "wrong".to_string(),
        device: "laptop".to_string(),
    };
    assert!(matches!(
        server.create_session(wrong).await,
        Err(Error::PermissionDenied)
    ));

    let session = server
        .create_session(NewSession {
            user: "hanako".to_string(),
            password: "correct horse".to_string(),
            device: "laptop".to_string(),
        })
        .await
        .expect("sign in");
    assert_eq!(session.user.name, "hanako");
    assert!(matches!(
        session.viewer(),
        Viewer::User { moderator: false, .. }
    ));
    assert!(matches!(
        sessions.next().await,
        Some(SessionChange::SignedIn(id)) if id == session.user.id
    ));

    let found = server.session(session.token).await.expect("lookup");
    assert_eq!(found.map(|s| s.user.id), Some(session.user.id));

    server
        .destroy_session(session.token)
        .await
        .expect("sign out");
    assert!(server.session(session.token).await.expect("lookup").is_none());
    assert!(matches!(
        server.destroy_session(session.token).await,
        Err(Error::PermissionDenied)
    ));
    assert!(matches!(
        sessions.next().await,
        Some(SessionChange::SignedOut(id)) if id == session.user.id
    ));
}

#[tokio::test]
async fn duplicate_user_names_are_refused() {
    let server = server();
    signup(&server, "hanako");
    assert!(matches!(
        server.admin_create_user("hanako", "other@example.org", "pass", false),
        Err(Error::NameAlreadyUsed(name)) if name == "hanako"
    ));
}
