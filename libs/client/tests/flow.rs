use client::{
    ApiClient, ClientError, MediaFile, NewPinForm,
    geofence::{BoundingBox, Coordinates},
};
use common::models::{
    CreateCircleRequest, SignUpRequest, UpdatePinRequest, UpdateProfileRequest, Visibility,
};
use gateway::{MemoryBackend, create_router};
use tokio::net::TcpListener;

async fn spawn_gateway() -> String {
    let backend = MemoryBackend::new("http://storage.test/public");
    let app = create_router(backend.state());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", address)
}

async fn signed_up(base_url: &str, username: &str) -> ApiClient {
    let client = ApiClient::new(base_url);
    let response = client
        .sign_up(&SignUpRequest {
            email: format!("{}@pindrop.test", username),
            password: "correct horse".to_string(),
            username: username.to_string(),
            full_name: None,
        })
        .await
        .unwrap();
    assert_eq!(response.profile.unwrap().username, username);
    assert!(client.is_signed_in().await);
    client
}

fn at(latitude: f64, longitude: f64) -> Coordinates {
    Coordinates {
        latitude,
        longitude,
    }
}

#[tokio::test]
async fn circles_and_pins_end_to_end() {
    let base_url = spawn_gateway().await;
    let alice = signed_up(&base_url, "alice").await;
    let bob = signed_up(&base_url, "bob").await;

    let circle = alice
        .create_circle(&CreateCircleRequest {
            name: "Climbers".to_string(),
            visibility: Visibility::Private,
        })
        .await
        .unwrap();
    let code = circle.access_code.clone().unwrap();

    bob.join_circle(circle.id, &code).await.unwrap();
    let again = bob.join_circle(circle.id, &code).await.unwrap_err();
    assert_eq!(again.status(), Some(409));
    assert_eq!(alice.members(circle.id).await.unwrap().len(), 2);

    let shared = alice
        .create_pin(
            NewPinForm::new("Crag", at(45.9, 6.1), Visibility::Social)
                .description("North face")
                .share_with(circle.id)
                .image(MediaFile::new("crag.jpg", "image/jpeg", vec![1, 2, 3]))
                .audio(MediaFile::new("wind.mp3", "audio/mpeg", vec![4, 5, 6])),
        )
        .await
        .unwrap();
    assert_eq!(shared.image_urls.len(), 1);
    assert!(shared.audio_url.is_some());

    let hidden = alice
        .create_pin(NewPinForm::new("Home", at(45.8, 6.0), Visibility::Private))
        .await
        .unwrap();
    let public = bob
        .create_pin(NewPinForm::new("Lake", at(46.2, 6.15), Visibility::Public))
        .await
        .unwrap();

    let mut seen: Vec<_> = bob
        .visible_pins(None)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    seen.sort();
    let mut expected = vec![shared.id, public.id];
    expected.sort();
    assert_eq!(seen, expected);

    assert_eq!(bob.pin(hidden.id).await.unwrap_err().status(), Some(404));
    assert_eq!(
        bob.update_pin(shared.id, &UpdatePinRequest::default())
            .await
            .unwrap_err()
            .status(),
        Some(403)
    );

    let nearby = BoundingBox::new(46.0, 6.0, 46.5, 6.5).unwrap();
    let in_box = bob.public_pins(Some(nearby)).await.unwrap();
    assert_eq!(in_box.len(), 1);
    assert_eq!(in_box[0].id, public.id);

    alice.delete_pin(shared.id).await.unwrap();
    assert_eq!(bob.visible_pins(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sessions_refresh_and_close() {
    let base_url = spawn_gateway().await;
    let carol = signed_up(&base_url, "carol").await;

    let profile = carol
        .update_profile(&UpdateProfileRequest {
            username: None,
            full_name: Some("Carol Danvers".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(profile.full_name.as_deref(), Some("Carol Danvers"));

    let before = carol.session().await.unwrap();
    carol.refresh().await.unwrap();
    let after = carol.session().await.unwrap();
    assert_ne!(before.refresh_token, after.refresh_token);
    assert_eq!(carol.me().await.unwrap().user.id, profile.id);

    carol.sign_out().await.unwrap();
    assert!(matches!(carol.my_pins().await, Err(ClientError::NotSignedIn)));

    carol.sign_in("carol@pindrop.test", "correct horse").await.unwrap();
    carol.delete_account().await.unwrap();
    let err = carol
        .sign_in("carol@pindrop.test", "correct horse")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn invalid_pins_are_refused_without_a_request() {
    let client = ApiClient::new("http://127.0.0.1:9");
    let err = client
        .create_pin(NewPinForm::new("Nowhere", at(0.0, 200.0), Visibility::Public))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}
