use opencv::core::{DMatch, KeyPoint, Scalar, Vector};
use opencv::features2d::{DrawMatchesFlags, draw_keypoints, draw_matches};
use opencv::prelude::*;
use opencv::{Error, core, highgui};

/// Рисует ключевые точки поверх копии изображения.
pub fn render_keypoints(img: &Mat, keypoints: &Vector<KeyPoint>) -> Result<Mat, Error> {
    let mut vis_image = img.clone();
    draw_keypoints(
        img,
        keypoints,
        &mut vis_image,
        Scalar::all(-1.0),
        DrawMatchesFlags::DRAW_RICH_KEYPOINTS,
    )?;
    Ok(vis_image)
}

/// Склеивает два кадра и соединяет сопоставленные точки линиями.
pub fn render_matches(
    img_source: &Mat,
    keypoints_source: &Vector<KeyPoint>,
    img_ref: &Mat,
    keypoints_ref: &Vector<KeyPoint>,
    matches: &Vector<DMatch>,
) -> Result<Mat, Error> {
    let mut match_img = Mat::default();
    draw_matches(
        img_source,
        keypoints_source,
        img_ref,
        keypoints_ref,
        matches,
        &mut match_img,
        Scalar::all(-1.0),
        Scalar::all(-1.0),
        &Vector::<i8>::new(),
        DrawMatchesFlags::DRAW_RICH_KEYPOINTS,
    )?;
    Ok(match_img)
}

/// Показывает изображение в окне и ждёт нажатия клавиши.
pub fn show_and_wait(window_name: &str, img: &Mat) -> Result<i32, Error> {
    highgui::named_window(window_name, highgui::WINDOW_KEEPRATIO)?;
    highgui::imshow(window_name, img)?;
    highgui::wait_key(0)
}

pub fn show_keypoints(
    img: &Mat,
    keypoints: &Vector<KeyPoint>,
    window_name: &str,
) -> Result<(), Error> {
    let vis_image = render_keypoints(img, keypoints)?;
    show_and_wait(window_name, &vis_image)?;
    Ok(())
}

/// Отклик Харриса нормирован в float, для показа переводим его в 8 бит.
pub fn show_harris_response(
    corners_norm: &Mat,
    keypoints: &Vector<KeyPoint>,
    window_name: &str,
) -> Result<(), Error> {
    let mut corners_scaled = Mat::default();
    core::convert_scale_abs(corners_norm, &mut corners_scaled, 1.0, 0.0)?;
    show_keypoints(&corners_scaled, keypoints, window_name)
}

pub fn show_matches(
    img_source: &Mat,
    keypoints_source: &Vector<KeyPoint>,
    img_ref: &Mat,
    keypoints_ref: &Vector<KeyPoint>,
    matches: &Vector<DMatch>,
    window_name: &str,
) -> Result<(), Error> {
    let match_img = render_matches(img_source, keypoints_source, img_ref, keypoints_ref, matches)?;
    show_and_wait(window_name, &match_img)?;
    Ok(())
}
