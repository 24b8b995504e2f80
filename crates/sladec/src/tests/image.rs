use std::sync::Arc;

use crate::*;

fn varnode(offset: u64, size: usize) -> VarnodeData {
    VarnodeData::new(Address::new(AddressSpaceId::new(1), offset), size)
}

#[test]
fn flat_image() {
    let image = vec![0x01, 0x02, 0x03, 0x04];
    assert_eq!(image.instruction_bytes(&varnode(1, 2)), Ok(vec![0x02, 0x03]));
    assert_eq!(image.instruction_bytes(&varnode(0, 4)), Ok(image.clone()));
    assert_eq!(
        image.instruction_bytes(&varnode(3, 2)),
        Err(ImageError::OutOfBounds(varnode(3, 2)))
    );
    assert_eq!(
        image.instruction_bytes(&varnode(u64::MAX, 1)),
        Err(ImageError::OutOfBounds(varnode(u64::MAX, 1)))
    );

    let slice: &[u8] = &image;
    assert_eq!(slice.instruction_bytes(&varnode(0, 1)), Ok(vec![0x01]));
}

#[test]
fn empty_image() {
    assert_eq!(
        EmptyImage.instruction_bytes(&varnode(0, 1)),
        Err(ImageError::OutOfBounds(varnode(0, 1)))
    );
}

#[test]
fn sectioned_image() {
    let image = Image::new()
        .with_section(ImageSection::new(0x1000, vec![0x90, 0x91, 0x92], Perms::RX))
        .with_section(ImageSection::new(0x2000, vec![0xaa; 4], Perms::RW));

    assert_eq!(image.sections().len(), 2);
    assert_eq!(image.instruction_bytes(&varnode(0x1001, 2)), Ok(vec![0x91, 0x92]));

    // Data sections cannot be executed
    assert_eq!(
        image.instruction_bytes(&varnode(0x2000, 1)),
        Err(ImageError::NotExecutable(varnode(0x2000, 1)))
    );

    // Reads may not extend past the end of a section
    assert_eq!(
        image.instruction_bytes(&varnode(0x1002, 2)),
        Err(ImageError::OutOfBounds(varnode(0x1002, 2)))
    );
    assert_eq!(
        image.instruction_bytes(&varnode(0x0fff, 1)),
        Err(ImageError::OutOfBounds(varnode(0x0fff, 1)))
    );
}

#[test]
fn shared_images() {
    let image = Arc::new(vec![0x01, 0x02]);
    let boxed: Box<dyn LoadImage> = Box::new(Arc::clone(&image));
    assert_eq!(boxed.instruction_bytes(&varnode(1, 1)), Ok(vec![0x02]));
    assert_eq!((&image).instruction_bytes(&varnode(0, 1)), Ok(vec![0x01]));
}
